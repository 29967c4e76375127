use super::classifier::{classify, ExitPolicy};
use super::shutdown::{ShutdownCoordinator, ShutdownTicket};
use super::taxonomy::{ServiceFault, SurfacedFault};
use log::{error, warn};
use parking_lot::Mutex;

/// Front door for faults raised by a hosted replica or arbiter service.
pub struct ServiceFaultHandler {
    default_policy: ExitPolicy,
    coordinator: ShutdownCoordinator,
    shutdown: Mutex<ShutdownState>,
}

#[derive(Default)]
struct ShutdownState {
    fault: Option<ServiceFault>,
    ticket: Option<ShutdownTicket>,
}

impl ServiceFaultHandler {
    pub fn new(default_policy: ExitPolicy, coordinator: ShutdownCoordinator) -> Self {
        Self {
            default_policy,
            coordinator,
            shutdown: Mutex::new(ShutdownState::default()),
        }
    }

    pub fn default_policy(&self) -> ExitPolicy {
        self.default_policy
    }

    /// Runs a service operation; a failure is classified, may queue a
    /// process shutdown, and comes back in caller-visible form.
    pub fn execute<T, F>(&self, operation: &str, op: F) -> Result<T, SurfacedFault>
    where
        F: FnOnce() -> Result<T, ServiceFault>,
    {
        op().map_err(|fault| self.handle(operation, fault))
    }

    pub fn handle(&self, operation: &str, fault: ServiceFault) -> SurfacedFault {
        let decision = classify(&fault, self.default_policy);
        if !decision.exit_policy.requires_shutdown() {
            warn!(
                "event=service_operation_failed operation={} kind={} fault={}",
                operation,
                fault.kind(),
                fault
            );
            return decision.surfaced;
        }
        error!(
            "event=service_fault_shutdown operation={} kind={} policy={:?} fault={}",
            operation,
            fault.kind(),
            decision.exit_policy,
            fault
        );
        let mut shutdown = self.shutdown.lock();
        if shutdown.fault.is_none() {
            shutdown.ticket = self.coordinator.queue(&fault, decision.exit_policy);
            shutdown.fault = Some(fault);
        }
        decision.surfaced
    }

    /// The fault that started the shutdown, if any. Later fatal faults do
    /// not replace it.
    pub fn shutdown_fault(&self) -> Option<ServiceFault> {
        self.shutdown.lock().fault.clone()
    }

    /// Hands over the queued shutdown so a caller can wait on it.
    pub fn take_shutdown_ticket(&self) -> Option<ShutdownTicket> {
        self.shutdown.lock().ticket.take()
    }
}
