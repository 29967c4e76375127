use super::taxonomy::{ServiceFault, SurfacedFault};
use crate::service::ServiceStatus;
use serde::{Deserialize, Serialize};

pub const TABLE_VERSION_RETRY_MESSAGE: &str =
    "Store is updating table schema information; operation should be retried";

/// What happens to the hosting process after a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Operation failure only; the process keeps running.
    None,
    NoRestart,
    Restart,
}

impl ExitPolicy {
    /// Status code the process exits with, understood by the storage-node
    /// supervisor.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            ExitPolicy::None => None,
            ExitPolicy::NoRestart => Some(1),
            ExitPolicy::Restart => Some(200),
        }
    }

    pub fn requires_shutdown(self) -> bool {
        self != ExitPolicy::None
    }

    /// Status published by the service before the process goes away.
    pub fn exit_status(self) -> Option<ServiceStatus> {
        match self {
            ExitPolicy::None => None,
            ExitPolicy::NoRestart => Some(ServiceStatus::ErrorNoRestart),
            ExitPolicy::Restart => Some(ServiceStatus::ErrorRestarting),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultDecision {
    pub surfaced: SurfacedFault,
    pub exit_policy: ExitPolicy,
}

/// Maps a raised fault to its caller-visible form and the process exit
/// policy. Total over [`ServiceFault`] and free of side effects.
pub fn classify(fault: &ServiceFault, default: ExitPolicy) -> FaultDecision {
    if let ServiceFault::QueryRuntime { cause } = fault {
        return classify(cause, default);
    }
    FaultDecision {
        surfaced: surface(fault),
        exit_policy: decide_exit_policy(fault, default),
    }
}

fn surface(fault: &ServiceFault) -> SurfacedFault {
    match fault {
        ServiceFault::Surfaced(surfaced) => surfaced.clone(),
        ServiceFault::SessionAccess { message } => SurfacedFault::SessionAccess {
            message: message.clone(),
        },
        ServiceFault::Security { message } => {
            SurfacedFault::WrappedClient(Box::new(SurfacedFault::Security {
                message: message.clone(),
            }))
        }
        ServiceFault::MetadataNotFound { message } => {
            SurfacedFault::WrappedClient(Box::new(SurfacedFault::MetadataNotFound {
                message: message.clone(),
            }))
        }
        ServiceFault::ClientAccess { cause } => cause.clone(),
        ServiceFault::EnvironmentRetry { message } => SurfacedFault::Unavailable {
            message: message.clone(),
        },
        ServiceFault::QueryRuntime { cause } => surface(cause),
        ServiceFault::TableVersion { .. } => SurfacedFault::Fault {
            message: TABLE_VERSION_RETRY_MESSAGE.to_string(),
            remote: true,
            retryable: true,
        },
        ServiceFault::EnvironmentFailure { .. } | ServiceFault::Internal { .. } => {
            SurfacedFault::Fault {
                message: fault.to_string(),
                remote: true,
                retryable: false,
            }
        }
    }
}

/// A corrupted environment never restarts; faults that surface as operation
/// failures keep the process alive; everything else takes `default`.
pub fn decide_exit_policy(fault: &ServiceFault, default: ExitPolicy) -> ExitPolicy {
    match fault {
        ServiceFault::EnvironmentFailure {
            corrupted: true, ..
        } => ExitPolicy::NoRestart,
        ServiceFault::Surfaced(_)
        | ServiceFault::SessionAccess { .. }
        | ServiceFault::EnvironmentRetry { .. }
        | ServiceFault::TableVersion { .. } => ExitPolicy::None,
        ServiceFault::QueryRuntime { cause } => decide_exit_policy(cause, default),
        ServiceFault::Security { .. }
        | ServiceFault::MetadataNotFound { .. }
        | ServiceFault::ClientAccess { .. }
        | ServiceFault::EnvironmentFailure { .. }
        | ServiceFault::Internal { .. } => default,
    }
}
