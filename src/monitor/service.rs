use super::measurement::Measurement;
use super::repository::AgentRepository;
use crate::service::{ConfigurableService, ServiceError, ServiceStatus};
use crate::topology::ResourceId;
use crate::util::now_millis;
use log::info;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

type StopHook = Box<dyn Fn(bool) -> Result<(), ServiceError> + Send + Sync>;

/// A service whose status transitions are published as measurements into
/// its monitor repository.
pub struct MonitoredService {
    resource: ResourceId,
    status: Mutex<ServiceStatus>,
    repository: Arc<AgentRepository>,
    stop_hook: Option<StopHook>,
}

impl MonitoredService {
    pub fn new(resource: ResourceId, repository: Arc<AgentRepository>) -> Self {
        Self {
            resource,
            status: Mutex::new(ServiceStatus::Starting),
            repository,
            stop_hook: None,
        }
    }

    /// Runs `hook(force)` while stopping, before the terminal status is set.
    pub fn with_stop_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(bool) -> Result<(), ServiceError> + Send + Sync + 'static,
    {
        self.stop_hook = Some(Box::new(hook));
        self
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn repository(&self) -> &Arc<AgentRepository> {
        &self.repository
    }
}

impl fmt::Debug for MonitoredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoredService")
            .field("resource", &self.resource)
            .field("status", &*self.status.lock())
            .finish()
    }
}

impl ConfigurableService for MonitoredService {
    fn name(&self) -> String {
        self.resource.to_string()
    }

    fn status(&self) -> ServiceStatus {
        *self.status.lock()
    }

    fn update(&self, status: ServiceStatus) {
        // Recorded under the status lock so measurements follow transition order.
        let mut current = self.status.lock();
        let previous = std::mem::replace(&mut *current, status);
        if previous == status {
            return;
        }
        self.repository
            .add(Measurement::status_change(self.resource, now_millis(), status));
        drop(current);
        info!(
            "event=service_status resource={} from={} to={}",
            self.resource, previous, status
        );
    }

    fn stop(&self, force: bool) -> Result<(), ServiceError> {
        if self.status().is_terminal() {
            return Ok(());
        }
        self.update(ServiceStatus::Stopping);
        let outcome = match &self.stop_hook {
            Some(hook) => hook(force),
            None => Ok(()),
        };
        if outcome.is_ok() || force {
            self.update(ServiceStatus::Stopped);
        }
        outcome
    }
}
