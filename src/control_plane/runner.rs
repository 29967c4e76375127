use super::cleanup::{CleanupHandle, CleanupJob};
use super::deploy::{CleanupPolicy, DeployError};
use super::plan::DeployPlan;
use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Succeeded,
    Error,
    Interrupted,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Error => "ERROR",
            TaskState::Interrupted => "INTERRUPTED",
        };
        f.write_str(label)
    }
}

pub trait Task: Send + Sync {
    fn name(&self) -> String;
    fn execute(&self) -> Result<TaskState, DeployError>;
    /// Compensating job to start when `execute` fails.
    fn cleanup_job(&self) -> Option<CleanupJob>;
    fn continue_past_error(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub state: TaskState,
    pub error: Option<DeployError>,
    pub cleanup: Option<CleanupHandle>,
}

impl TaskOutcome {
    fn finished(state: TaskState) -> Self {
        Self {
            state,
            error: None,
            cleanup: None,
        }
    }

    /// True when the plan must not schedule anything beyond this task's own
    /// cleanup.
    pub fn is_fatal(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|err| err.cleanup_policy().is_fatal())
    }
}

/// Executes the tasks of one plan and starts cleanup jobs for the ones that
/// fail.
pub struct TaskRunner {
    plan: Arc<DeployPlan>,
}

impl TaskRunner {
    pub fn new(plan: Arc<DeployPlan>) -> Self {
        Self { plan }
    }

    pub fn run(&self, task: &dyn Task) -> TaskOutcome {
        let name = task.name();
        if self.plan.is_cancelled() {
            info!("event=task_skipped plan={} task={} reason=cancelled", self.plan.id(), name);
            return TaskOutcome::finished(TaskState::Interrupted);
        }
        let started = Instant::now();
        info!("event=task_start plan={} task={}", self.plan.id(), name);
        let err = match task.execute() {
            Ok(state) => {
                info!(
                    "event=task_end plan={} task={} state={} elapsed_ms={}",
                    self.plan.id(),
                    task.name(),
                    state,
                    started.elapsed().as_millis()
                );
                return TaskOutcome::finished(state);
            }
            Err(err) => err,
        };

        let policy = err.cleanup_policy();
        error!(
            "event=task_failed plan={} task={} policy={:?} continue={} error={}",
            self.plan.id(),
            task.name(),
            policy,
            task.continue_past_error(),
            err
        );
        let state = if self.plan.is_cancelled() {
            TaskState::Interrupted
        } else {
            TaskState::Error
        };
        let cleanup = match policy {
            CleanupPolicy::PlanCancel => {
                self.plan.cancel();
                None
            }
            CleanupPolicy::RunCleanup | CleanupPolicy::NoCleanupJobs => {
                task.cleanup_job().and_then(|job| match job.spawn() {
                    Ok(handle) => Some(handle),
                    Err(spawn_err) => {
                        warn!(
                            "event=cleanup_spawn_failed plan={} task={} error={}",
                            self.plan.id(),
                            name,
                            spawn_err
                        );
                        None
                    }
                })
            }
        };
        TaskOutcome {
            state,
            error: Some(err),
            cleanup,
        }
    }
}
