use super::repository::{AgentRepository, Snapshot};
use crate::topology::ResourceId;
use log::info;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Hook through which newly deployed nodes are made visible to monitoring.
pub trait MonitorRegistration: Send + Sync {
    fn register_agent(&self, host: &str, port: u16, resource: ResourceId);
}

#[derive(Debug, Clone)]
pub struct AgentRegistration {
    pub host: String,
    pub port: u16,
    repository: Arc<AgentRepository>,
}

impl AgentRegistration {
    pub fn repository(&self) -> &Arc<AgentRepository> {
        &self.repository
    }
}

/// Resource-level monitor: one bounded repository per registered agent.
#[derive(Debug)]
pub struct Monitor {
    repository_capacity: usize,
    agents: RwLock<BTreeMap<ResourceId, AgentRegistration>>,
}

impl Monitor {
    pub fn new(repository_capacity: usize) -> Self {
        Self {
            repository_capacity: repository_capacity.max(1),
            agents: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers (or re-registers) an agent and returns its repository.
    /// Re-registration keeps the buffered measurements and updates the
    /// address.
    pub fn register(&self, host: &str, port: u16, resource: ResourceId) -> Arc<AgentRepository> {
        let mut agents = self.agents.write();
        let registration = agents.entry(resource).or_insert_with(|| AgentRegistration {
            host: host.to_string(),
            port,
            repository: Arc::new(AgentRepository::new(resource, self.repository_capacity)),
        });
        registration.host = host.to_string();
        registration.port = port;
        let repository = registration.repository.clone();
        let registered = agents.len();
        drop(agents);
        info!(
            "event=monitor_register_agent resource={} host={} port={} registered={}",
            resource, host, port, registered
        );
        repository
    }

    pub fn unregister(&self, resource: &ResourceId) -> Option<AgentRegistration> {
        self.agents.write().remove(resource)
    }

    pub fn registration(&self, resource: &ResourceId) -> Option<AgentRegistration> {
        self.agents.read().get(resource).cloned()
    }

    pub fn repository(&self, resource: &ResourceId) -> Option<Arc<AgentRepository>> {
        self.agents
            .read()
            .get(resource)
            .map(|registration| registration.repository.clone())
    }

    pub fn registered(&self) -> Vec<ResourceId> {
        self.agents.read().keys().copied().collect()
    }

    /// Drains one agent's repository.
    pub fn collect(&self, resource: &ResourceId) -> Option<Snapshot> {
        self.repository(resource)
            .map(|repository| repository.drain_and_reset())
    }

    /// Drains every registered repository. The registry lock is released
    /// before any repository is drained.
    pub fn collect_all(&self) -> Vec<(ResourceId, Snapshot)> {
        let repositories: Vec<_> = self
            .agents
            .read()
            .iter()
            .map(|(resource, registration)| (*resource, registration.repository.clone()))
            .collect();
        repositories
            .into_iter()
            .map(|(resource, repository)| (resource, repository.drain_and_reset()))
            .collect()
    }

    /// Total live measurements waiting across all repositories.
    pub fn backlog(&self) -> usize {
        self.agents
            .read()
            .values()
            .map(|registration| registration.repository.size())
            .sum()
    }
}

impl MonitorRegistration for Monitor {
    fn register_agent(&self, host: &str, port: u16, resource: ResourceId) {
        self.register(host, port, resource);
    }
}
