use super::classifier::ExitPolicy;
use super::taxonomy::ServiceFault;
use crate::observability::logging::close_all_handlers;
use crate::service::ConfigurableService;
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Last-resort output that does not depend on the logging system.
pub trait FallbackChannel: Send + Sync {
    fn write_line(&self, line: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrChannel;

impl FallbackChannel for StderrChannel {
    fn write_line(&self, line: &str) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{line}");
        let _ = stderr.flush();
    }
}

pub trait ProcessExiter: Send + Sync {
    fn exit(&self, code: i32);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdProcessExiter;

impl ProcessExiter for StdProcessExiter {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Publish the error status, flush logs and exit the process.
    #[default]
    Process,
    /// Force-stop the service and leave the process running.
    Test,
}

/// Runs the asynchronous shutdown that follows a fatal service fault.
///
/// The shutdown thread is detached: the process may exit before the caller
/// that queued it observes anything, including its own bookkeeping.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    mode: ShutdownMode,
    service: Arc<dyn ConfigurableService>,
    fallback: Arc<dyn FallbackChannel>,
    exiter: Arc<dyn ProcessExiter>,
}

impl ShutdownCoordinator {
    pub fn new(mode: ShutdownMode, service: Arc<dyn ConfigurableService>) -> Self {
        Self {
            mode,
            service,
            fallback: Arc::new(StderrChannel),
            exiter: Arc::new(StdProcessExiter),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackChannel>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_exiter(mut self, exiter: Arc<dyn ProcessExiter>) -> Self {
        self.exiter = exiter;
        self
    }

    pub fn mode(&self) -> ShutdownMode {
        self.mode
    }

    /// Starts the shutdown on a named background thread and returns at once.
    /// Nothing is queued for [`ExitPolicy::None`]. If the thread cannot be
    /// spawned the shutdown runs on the calling thread.
    pub fn queue(&self, fault: &ServiceFault, policy: ExitPolicy) -> Option<ShutdownTicket> {
        let exit_code = policy.exit_code()?;
        let job = Arc::new(ShutdownJob {
            mode: self.mode,
            service: self.service.clone(),
            fallback: self.fallback.clone(),
            exiter: self.exiter.clone(),
            fault: fault.to_string(),
            policy,
            exit_code,
        });
        let spawned = job.clone();
        match thread::Builder::new()
            .name(format!("{}-fault-shutdown", self.service.name()))
            .spawn(move || spawned.run())
        {
            Ok(handle) => Some(ShutdownTicket { handle }),
            Err(err) => {
                warn!(
                    "event=shutdown_thread_spawn_failed service={} error={err}",
                    self.service.name()
                );
                job.run();
                None
            }
        }
    }
}

struct ShutdownJob {
    mode: ShutdownMode,
    service: Arc<dyn ConfigurableService>,
    fallback: Arc<dyn FallbackChannel>,
    exiter: Arc<dyn ProcessExiter>,
    fault: String,
    policy: ExitPolicy,
    exit_code: i32,
}

impl ShutdownJob {
    fn run(&self) {
        match self.mode {
            ShutdownMode::Test => self.stop_service(),
            ShutdownMode::Process => self.exit_process(),
        }
    }

    fn stop_service(&self) {
        if let Err(err) = self.service.stop(true) {
            // The logger may be in an unknown state at this point.
            self.fallback
                .write_line(&format!("Exception during exit: {err}"));
        }
    }

    fn exit_process(&self) {
        thread::yield_now();
        let bookkeeping = panic::catch_unwind(AssertUnwindSafe(|| {
            self.fallback
                .write_line(&format!("Process exiting due to fault: {}", self.fault));
            if let Some(status) = self.policy.exit_status() {
                self.service.update(status);
            }
            close_all_handlers();
        }));
        if bookkeeping.is_err() {
            self.fallback
                .write_line("Shutdown bookkeeping failed; exiting anyway");
        }
        self.exiter.exit(self.exit_code);
    }
}

/// Handle on a queued shutdown. Dropping it leaves the thread detached.
#[derive(Debug)]
pub struct ShutdownTicket {
    handle: JoinHandle<()>,
}

impl ShutdownTicket {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the shutdown thread; false if it panicked.
    pub fn join(self) -> bool {
        self.handle.join().is_ok()
    }
}
