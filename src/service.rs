//! Lifecycle status shared by every managed service (replica, arbiter,
//! admin) and the narrow interface the fault handler drives on shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceStatus {
    Starting,
    WaitingForDeploy,
    Running,
    Stopping,
    Stopped,
    ErrorRestarting,
    ErrorNoRestart,
    Unreachable,
}

impl ServiceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServiceStatus::Stopped | ServiceStatus::ErrorRestarting | ServiceStatus::ErrorNoRestart
        )
    }

    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            ServiceStatus::Starting | ServiceStatus::WaitingForDeploy | ServiceStatus::Running
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Starting => "STARTING",
            ServiceStatus::WaitingForDeploy => "WAITING_FOR_DEPLOY",
            ServiceStatus::Running => "RUNNING",
            ServiceStatus::Stopping => "STOPPING",
            ServiceStatus::Stopped => "STOPPED",
            ServiceStatus::ErrorRestarting => "ERROR_RESTARTING",
            ServiceStatus::ErrorNoRestart => "ERROR_NO_RESTART",
            ServiceStatus::Unreachable => "UNREACHABLE",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationState {
    Master,
    Replica,
    Unknown,
    Detached,
}

impl fmt::Display for ReplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReplicationState::Master => "MASTER",
            ReplicationState::Replica => "REPLICA",
            ReplicationState::Unknown => "UNKNOWN",
            ReplicationState::Detached => "DETACHED",
        };
        f.write_str(label)
    }
}

/// Point-in-time status of a replicated service, as reported by ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatusReport {
    status: ServiceStatus,
    replication_state: Option<ReplicationState>,
    authoritative_master: bool,
}

impl ServiceStatusReport {
    /// Authoritative mastership only holds when the replication state is
    /// `Master`; it is dropped otherwise.
    pub fn new(
        status: ServiceStatus,
        replication_state: Option<ReplicationState>,
        authoritative_master: bool,
    ) -> Self {
        Self {
            status,
            replication_state,
            authoritative_master: authoritative_master
                && replication_state == Some(ReplicationState::Master),
        }
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn replication_state(&self) -> Option<ReplicationState> {
        self.replication_state
    }

    pub fn is_authoritative_master(&self) -> bool {
        self.authoritative_master
    }
}

impl fmt::Display for ServiceStatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.replication_state {
            Some(state) => write!(f, "{},{}", self.status, state)?,
            None => write!(f, "{},null", self.status)?,
        }
        if self.replication_state == Some(ReplicationState::Master) && !self.authoritative_master
        {
            f.write_str(" (non-authoritative)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service {service} failed to stop: {reason}")]
    StopFailed { service: String, reason: String },
}

/// A service whose status the fault handler can update and which it can stop.
pub trait ConfigurableService: Send + Sync {
    fn name(&self) -> String;

    fn status(&self) -> ServiceStatus;

    fn update(&self, status: ServiceStatus);

    /// Stops the service. A forced stop leaves it in the terminal
    /// `Stopped` state even when components fail to shut down cleanly.
    fn stop(&self, force: bool) -> Result<(), ServiceError>;
}
