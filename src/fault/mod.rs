//! Fault classification and fatal-fault shutdown for hosted services.

mod classifier;
mod handler;
mod shutdown;
mod taxonomy;

pub use classifier::{
    classify, decide_exit_policy, ExitPolicy, FaultDecision, TABLE_VERSION_RETRY_MESSAGE,
};
pub use handler::ServiceFaultHandler;
pub use shutdown::{
    FallbackChannel, ProcessExiter, ShutdownCoordinator, ShutdownMode, ShutdownTicket,
    StdProcessExiter, StderrChannel,
};
pub use taxonomy::{ServiceFault, SurfacedFault};
