//! Control-plane pieces of a replicated key-value store: metadata-first node
//! deployment with compensating cleanup, classification of service faults
//! into caller-visible errors and process exit policies, and bounded
//! telemetry buffers for monitored resources.

pub mod config;
pub mod control_plane;
pub mod fault;
pub mod monitor;
pub mod observability;
pub mod runtime;
pub mod service;
pub mod timeouts;
pub mod topology;
pub mod util;

pub use config::{load_config, ConfigError, ControlPlaneConfig};
pub use control_plane::{
    AgentResolver, CheckError, CleanupHandle, CleanupJob, CleanupOutcome, CleanupPolicy,
    DeployError, DeployNodeTask, DeployPlan, DeploySettings, InMemoryMetadataStore,
    MetadataError, MetadataSet, MetadataStore, MetadataTopologyCheck, MetadataUpdate,
    PortAllocator, PortError, PortTracker, ProvisioningAgent, RemoteError, Remedy, RemedyKind,
    ShardTarget, StorageNodeInspector, Task, TaskOutcome, TaskRunner, TaskState,
    TopologyChecker,
};
pub use fault::{
    classify, decide_exit_policy, ExitPolicy, FallbackChannel, FaultDecision, ProcessExiter,
    ServiceFault, ServiceFaultHandler, ShutdownCoordinator, ShutdownMode, ShutdownTicket,
    StderrChannel, SurfacedFault,
};
pub use monitor::{
    AgentRepository, Measurement, MeasurementKind, Monitor, MonitorRegistration,
    MonitoredService, Pruned, Snapshot, SnapshotEntry,
};
pub use observability::{close_all_handlers, init_logging};
pub use runtime::{start, ControlPlane};
pub use service::{
    ConfigurableService, ReplicationState, ServiceError, ServiceStatus, ServiceStatusReport,
};
pub use util::{CancellationToken, KvPlaneError, RetryPolicy};
