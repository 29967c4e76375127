//! Assembles the control plane from a configuration file: logging, the
//! metadata store, the monitor and the fault handling for hosted services.

use crate::config::{load_config, ControlPlaneConfig};
use crate::control_plane::{
    AgentResolver, DeployPlan, InMemoryMetadataStore, MetadataTopologyCheck,
    StorageNodeInspector,
};
use crate::fault::{ServiceFaultHandler, ShutdownCoordinator};
use crate::monitor::Monitor;
use crate::observability::init_logging;
use crate::service::ConfigurableService;
use crate::topology::{Parameters, Topology};
use crate::util::KvPlaneError;
use log::info;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct ControlPlane {
    config: ControlPlaneConfig,
    store: Arc<InMemoryMetadataStore>,
    monitor: Arc<Monitor>,
    agents: Arc<dyn AgentResolver>,
    checker: Arc<MetadataTopologyCheck>,
    next_plan_id: AtomicU64,
}

impl ControlPlane {
    /// Builds the control plane without touching the global logger. The
    /// configured topology document is loaded when it exists; otherwise the
    /// store starts empty with the configured policies.
    pub fn open(
        config: ControlPlaneConfig,
        agents: Arc<dyn AgentResolver>,
        inspector: Arc<dyn StorageNodeInspector>,
    ) -> Result<Self, KvPlaneError> {
        let store = match config.metadata.document_path.as_deref() {
            Some(path) if path.exists() => {
                let store = InMemoryMetadataStore::load(path)?;
                info!(
                    "event=metadata_loaded path={} sequence={}",
                    path.display(),
                    store.export_document()?.sequence
                );
                store
            }
            _ => InMemoryMetadataStore::new(
                Topology::default(),
                Parameters::new(config.policies()),
            ),
        };
        let store = Arc::new(store);
        let checker = Arc::new(MetadataTopologyCheck::new(store.clone(), inspector));
        let monitor = Arc::new(Monitor::new(config.monitor.repository_capacity));
        Ok(Self {
            config,
            store,
            monitor,
            agents,
            checker,
            next_plan_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<InMemoryMetadataStore> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// A fresh plan sharing this control plane's collaborators.
    pub fn new_plan(&self) -> Arc<DeployPlan> {
        let id = self.next_plan_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(
            DeployPlan::new(
                id,
                self.store.clone(),
                self.agents.clone(),
                self.checker.clone(),
                self.monitor.clone(),
            )
            .with_settings(self.config.deploy_settings()),
        )
    }

    /// Fault handler for a hosted service, using the configured default exit
    /// policy and shutdown mode.
    pub fn fault_handler(&self, service: Arc<dyn ConfigurableService>) -> ServiceFaultHandler {
        let coordinator = ShutdownCoordinator::new(self.config.fault.shutdown_mode, service);
        ServiceFaultHandler::new(self.config.fault.default_exit_policy, coordinator)
    }

    /// Writes the current metadata to the configured document, if any.
    /// Returns whether anything was written.
    pub fn persist(&self) -> Result<bool, KvPlaneError> {
        let Some(path) = self.config.metadata.document_path.as_deref() else {
            return Ok(false);
        };
        self.store.persist(path)?;
        Ok(true)
    }
}

/// Loads the configuration, installs the process logger and opens the
/// control plane.
pub fn start(
    config_path: &Path,
    agents: Arc<dyn AgentResolver>,
    inspector: Arc<dyn StorageNodeInspector>,
) -> Result<ControlPlane, KvPlaneError> {
    let config = load_config(config_path)?;
    init_logging(Some(&config.logging.filter))?;
    info!(
        "event=control_plane_start config={} shutdown_mode={:?}",
        config_path.display(),
        config.fault.shutdown_mode
    );
    ControlPlane::open(config, agents, inspector)
}
