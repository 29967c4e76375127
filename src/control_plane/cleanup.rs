use super::collaborators::{CheckError, TopologyChecker};
use crate::topology::{ReplicaNodeId, StorageNodeId};
use crate::util::{CancellationToken, RetryPolicy};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Completed,
    /// Gave up after the retry budget; left for a later plan to repair.
    TimedOut { attempts: usize },
    Interrupted,
    Failed { reason: String },
}

/// Best-effort repair of a deployment that failed part way. Retries until
/// the topology checker's remedy takes effect, the time budget runs out or
/// the plan is cancelled.
pub struct CleanupJob {
    task: String,
    storage_node: StorageNodeId,
    resolved: Arc<Mutex<Option<ReplicaNodeId>>>,
    checker: Arc<dyn TopologyChecker>,
    token: CancellationToken,
    policy: RetryPolicy,
}

impl CleanupJob {
    pub fn new(
        task: impl Into<String>,
        storage_node: StorageNodeId,
        resolved: Arc<Mutex<Option<ReplicaNodeId>>>,
        checker: Arc<dyn TopologyChecker>,
        token: CancellationToken,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            task: task.into(),
            storage_node,
            resolved,
            checker,
            token,
            policy,
        }
    }

    pub fn run(&self) -> CleanupOutcome {
        let Some(node) = *self.resolved.lock() else {
            info!("event=deploy_cleanup_noop task={}", self.task);
            return CleanupOutcome::Completed;
        };
        let mut retries = self.policy.handle();
        loop {
            if self.token.is_cancelled() {
                info!("event=deploy_cleanup_interrupted task={} node={}", self.task, node);
                return CleanupOutcome::Interrupted;
            }
            match self.attempt(node) {
                Ok(true) => {
                    info!("event=deploy_cleanup_done task={} node={}", self.task, node);
                    return CleanupOutcome::Completed;
                }
                Ok(false) => {}
                Err(err) => {
                    // Later plan runs have to sort out the context.
                    error!(
                        "event=deploy_cleanup_failed task={} node={} error={}",
                        self.task, node, err
                    );
                    return CleanupOutcome::Failed {
                        reason: err.to_string(),
                    };
                }
            }
            let Some(delay) = retries.next_delay() else {
                let attempts = retries.attempts() + 1;
                warn!(
                    "event=deploy_cleanup_timeout task={} node={} attempts={}",
                    self.task, node, attempts
                );
                return CleanupOutcome::TimedOut { attempts };
            };
            if self.token.sleep(delay) {
                info!("event=deploy_cleanup_interrupted task={} node={}", self.task, node);
                return CleanupOutcome::Interrupted;
            }
        }
    }

    fn attempt(&self, node: ReplicaNodeId) -> Result<bool, CheckError> {
        let remedy = self.checker.check_location(self.storage_node, node)?;
        info!(
            "event=deploy_cleanup_remedy task={} node={} sn={} remedy={}",
            self.task, node, self.storage_node, remedy.kind
        );
        self.checker.apply_remedy(&remedy)
    }

    /// Runs the job on a named background thread. The caller may drop the
    /// handle; the thread then runs detached.
    pub fn spawn(self) -> io::Result<CleanupHandle> {
        let handle = thread::Builder::new()
            .name(format!("cleanup-{}", self.storage_node))
            .spawn(move || self.run())?;
        Ok(CleanupHandle { handle })
    }
}

#[derive(Debug)]
pub struct CleanupHandle {
    handle: JoinHandle<CleanupOutcome>,
}

impl CleanupHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the job; `None` if it panicked.
    pub fn join(self) -> Option<CleanupOutcome> {
        self.handle.join().ok()
    }
}
