//! Node deployment: metadata-first task execution with compensating cleanup.

pub mod cleanup;
pub mod collaborators;
pub mod deploy;
pub mod plan;
pub mod port_tracker;
pub mod runner;
pub mod store;
pub mod topology_check;

pub use cleanup::{CleanupHandle, CleanupJob, CleanupOutcome};
pub use collaborators::{
    AgentResolver, CheckError, MetadataError, MetadataSet, MetadataStore, MetadataUpdate,
    PortAllocator, PortError, ProvisioningAgent, RemoteError, Remedy, RemedyKind, TopologyChecker,
};
pub use deploy::{CleanupPolicy, DeployError, DeployNodeTask, ShardTarget};
pub use plan::{DeployPlan, DeploySettings};
pub use port_tracker::PortTracker;
pub use runner::{Task, TaskOutcome, TaskRunner, TaskState};
pub use store::InMemoryMetadataStore;
pub use topology_check::{MetadataTopologyCheck, StorageNodeInspector};
