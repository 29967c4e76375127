use super::cleanup::CleanupJob;
use super::collaborators::{
    MetadataError, MetadataSet, MetadataUpdate, PortAllocator, PortError, RemoteError,
};
use super::plan::DeployPlan;
use super::port_tracker::PortTracker;
use super::runner::{Task, TaskState};
use crate::topology::{
    ReplicaNodeId, ReplicaNodeParams, ShardId, StorageDirectory, StorageNodeId, Topology,
    TopologyError,
};
use log::{info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// What a failed task leaves for the plan to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Run the task's cleanup job; the failure may be retried.
    RunCleanup,
    /// Fatal: nothing beyond the task's own cleanup may be scheduled.
    NoCleanupJobs,
    /// Fatal: cancel the plan without cleanup.
    PlanCancel,
}

impl CleanupPolicy {
    pub fn is_fatal(self) -> bool {
        self != CleanupPolicy::RunCleanup
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("storage node {0} is not in the topology")]
    UnknownStorageNode(StorageNodeId),
    #[error("storage node {0} has no parameters")]
    MissingStorageNodeParams(StorageNodeId),
    #[error("expected to find shard {0} in the current topology, but it is missing")]
    ShardNotFound(ShardId),
    #[error("plan shard slot {0} was never allocated")]
    UnresolvedShard(usize),
    #[error(
        "new node in {shard} on {storage_node} has no electable peers and is not electable itself"
    )]
    NotElectable {
        shard: ShardId,
        storage_node: StorageNodeId,
    },
    #[error("no parameters stored for existing node {0}")]
    MissingNodeParams(ReplicaNodeId),
    #[error(transparent)]
    RemoteInvalidState(RemoteError),
    #[error(transparent)]
    Remote(RemoteError),
    #[error("metadata commit still conflicting after {attempts} attempts")]
    CommitConflict { attempts: usize },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Port(#[from] PortError),
}

impl From<RemoteError> for DeployError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::InvalidState { .. } => DeployError::RemoteInvalidState(err),
            other => DeployError::Remote(other),
        }
    }
}

impl DeployError {
    pub fn cleanup_policy(&self) -> CleanupPolicy {
        match self {
            DeployError::UnknownStorageNode(_)
            | DeployError::MissingStorageNodeParams(_)
            | DeployError::ShardNotFound(_)
            | DeployError::UnresolvedShard(_)
            | DeployError::NotElectable { .. }
            | DeployError::RemoteInvalidState(_) => CleanupPolicy::NoCleanupJobs,
            DeployError::MissingNodeParams(_) => CleanupPolicy::PlanCancel,
            DeployError::Remote(_)
            | DeployError::CommitConflict { .. }
            | DeployError::Metadata(_)
            | DeployError::Topology(_)
            | DeployError::Port(_) => CleanupPolicy::RunCleanup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardTarget {
    Existing(ShardId),
    /// A shard created earlier in the same plan, by plan-local slot.
    PlanIndex(usize),
}

/// Ensures a replica node of a shard exists on a storage node.
///
/// Metadata is committed before any storage node is contacted. Re-running
/// the task after a partial failure adopts the node the earlier run
/// committed instead of creating a second one.
pub struct DeployNodeTask {
    plan: Arc<DeployPlan>,
    storage_node: StorageNodeId,
    descriptor: String,
    shard: ShardTarget,
    storage_directory: Option<StorageDirectory>,
    resolved: Arc<Mutex<Option<ReplicaNodeId>>>,
}

struct Prepared {
    topology: Topology,
    params: ReplicaNodeParams,
}

impl DeployNodeTask {
    pub fn new(
        plan: Arc<DeployPlan>,
        topology: &Topology,
        storage_node: StorageNodeId,
        shard: ShardTarget,
    ) -> Result<Self, DeployError> {
        let node = topology
            .storage_node(storage_node)
            .ok_or(DeployError::UnknownStorageNode(storage_node))?;
        let descriptor = format!("{}({}:{})", node.id, node.hostname, node.registry_port);
        Ok(Self {
            plan,
            storage_node,
            descriptor,
            shard,
            storage_directory: None,
            resolved: Arc::new(Mutex::new(None)),
        })
    }

    pub fn with_storage_directory(mut self, directory: StorageDirectory) -> Self {
        self.storage_directory = Some(directory);
        self
    }

    pub fn storage_node(&self) -> StorageNodeId {
        self.storage_node
    }

    pub fn resolved_node(&self) -> Option<ReplicaNodeId> {
        *self.resolved.lock()
    }

    pub fn execute(&self) -> Result<TaskState, DeployError> {
        let Prepared { topology, params } = self.prepare_with_retry()?;
        let node = params.id;

        let agent = self
            .plan
            .agents()
            .storage_node_agent(&topology, self.storage_node)?;
        let created = agent.create_node(&params.to_param_map(), &MetadataSet::new(topology.clone()))?;
        info!(
            "event=deploy_node_created plan={} node={} sn={} created={}",
            self.plan.id(),
            node,
            self.descriptor,
            created
        );

        let host = topology
            .storage_node(self.storage_node)
            .ok_or(DeployError::UnknownStorageNode(self.storage_node))?;
        self.plan
            .monitor()
            .register_agent(&host.hostname, host.registry_port, node.into());
        Ok(TaskState::Succeeded)
    }

    fn prepare_with_retry(&self) -> Result<Prepared, DeployError> {
        let mut retries = self.plan.settings().commit_policy().handle();
        loop {
            match self.prepare() {
                Err(DeployError::Metadata(err)) if err.is_conflict() => {
                    let Some(delay) = retries.next_delay() else {
                        return Err(DeployError::CommitConflict {
                            attempts: retries.attempts() + 1,
                        });
                    };
                    warn!(
                        "event=deploy_commit_conflict plan={} task={} retry_in_ms={} error={}",
                        self.plan.id(),
                        self,
                        delay.as_millis(),
                        err
                    );
                    thread::sleep(delay);
                }
                other => return other,
            }
        }
    }

    fn prepare(&self) -> Result<Prepared, DeployError> {
        let store = self.plan.store();
        let mut topology = store.current_topology()?;
        let shard_id = self.resolve_shard()?;
        let shard = topology
            .shard(shard_id)
            .ok_or(DeployError::ShardNotFound(shard_id))?;

        if let Some(existing) = shard.replica_on(self.storage_node) {
            let node = existing.id;
            self.set_resolved(node);
            info!(
                "event=deploy_node_adopt plan={} node={} sn={}",
                self.plan.id(),
                node,
                self.descriptor
            );
            let params = store
                .node_params(&node)?
                .ok_or(DeployError::MissingNodeParams(node))?;
            return Ok(Prepared { topology, params });
        }

        let parameters = store.current_parameters()?;
        let sn_params = parameters
            .storage_node(self.storage_node)
            .ok_or(DeployError::MissingStorageNodeParams(self.storage_node))?;
        let node_type = topology.datacenter_of(self.storage_node)?.default_replica_type();
        // Every existing member needs stored params to serve as a helper.
        let helpers = shard
            .replicas()
            .map(|replica| {
                parameters
                    .replica(&replica.id)
                    .map(ReplicaNodeParams::node_host_port)
                    .ok_or(DeployError::MissingNodeParams(replica.id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if helpers.is_empty() && !node_type.is_electable() {
            return Err(DeployError::NotElectable {
                shard: shard_id,
                storage_node: self.storage_node,
            });
        }

        let expected = topology.sequence();
        let node = topology.add_replica(shard_id, self.storage_node)?;
        let ha_port = PortTracker::new(&topology, &parameters).next_port(self.storage_node)?;
        let sizing = sn_params.calculate_heap_and_cache(
            &parameters.policies,
            topology.hosted_replica_ids(self.storage_node).len(),
            parameters.policies.replica_cache_percent,
            topology.hosted_arbiter_ids(self.storage_node).len(),
        );
        let mut params = ReplicaNodeParams {
            id: node,
            storage_node: self.storage_node,
            disabled: false,
            ha_hostname: sn_params.ha_hostname.clone(),
            ha_port,
            helper_hosts: String::new(),
            storage_directory: self.storage_directory.clone(),
            node_type,
            heap_mb: 0,
            cache_bytes: 0,
            cache_percent: 0,
            gc_threads: sn_params.calculate_gc_threads(),
            policies: parameters.copy_policies(),
        };
        // A node without peers helps itself to bootstrap its group.
        params.helper_hosts = if helpers.is_empty() {
            params.node_host_port()
        } else {
            helpers.join(",")
        };
        params.set_heap_and_cache(sizing);

        let update = MetadataUpdate::new(expected)
            .with_topology(topology.clone())
            .upsert_replica(params.clone());
        let sequence = store.commit(update)?;
        topology.set_sequence(sequence);
        self.set_resolved(node);
        info!(
            "event=deploy_node_committed plan={} node={} sn={} ha_port={} sequence={}",
            self.plan.id(),
            node,
            self.descriptor,
            ha_port,
            sequence
        );
        Ok(Prepared { topology, params })
    }

    fn resolve_shard(&self) -> Result<ShardId, DeployError> {
        match self.shard {
            ShardTarget::Existing(shard) => Ok(shard),
            ShardTarget::PlanIndex(index) => self
                .plan
                .allocated_shard(index)
                .ok_or(DeployError::UnresolvedShard(index)),
        }
    }

    fn set_resolved(&self, node: ReplicaNodeId) {
        *self.resolved.lock() = Some(node);
    }
}

impl fmt::Display for DeployNodeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeployNode ")?;
        if let Some(node) = self.resolved_node() {
            write!(f, "{node} ")?;
        }
        write!(f, "on {}", self.descriptor)
    }
}

impl Task for DeployNodeTask {
    fn name(&self) -> String {
        self.to_string()
    }

    fn execute(&self) -> Result<TaskState, DeployError> {
        DeployNodeTask::execute(self)
    }

    fn cleanup_job(&self) -> Option<CleanupJob> {
        Some(CleanupJob::new(
            self.name(),
            self.storage_node,
            self.resolved.clone(),
            self.plan.checker().clone(),
            self.plan.cleanup_token().clone(),
            self.plan.settings().cleanup_policy(),
        ))
    }
}
