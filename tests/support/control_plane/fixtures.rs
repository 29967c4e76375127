#![allow(dead_code)]

use kvplane::control_plane::{
    AgentResolver, CheckError, DeployPlan, DeploySettings, InMemoryMetadataStore, MetadataError,
    MetadataSet, MetadataStore, MetadataUpdate, ProvisioningAgent, RemoteError, Remedy,
    RemedyKind, StorageNodeInspector, TopologyChecker,
};
use kvplane::monitor::Monitor;
use kvplane::topology::{
    Datacenter, DatacenterId, DatacenterType, ParameterMap, Parameters, Policies, PortRange,
    ReplicaNodeId, ReplicaNodeParams, ShardId, StorageNode, StorageNodeId, StorageNodeParams,
    Topology,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const PRIMARY_SN: StorageNodeId = StorageNodeId(1);
pub const SECOND_PRIMARY_SN: StorageNodeId = StorageNodeId(2);
pub const SECONDARY_SN: StorageNodeId = StorageNodeId(3);
pub const SHARD: ShardId = ShardId(1);
pub const HA_PORT_START: u16 = 5010;

/// Two datacenters: zn1 (primary) hosts sn1 and sn2, zn2 (secondary) hosts sn3.
pub fn layout() -> (Topology, Parameters) {
    let mut topology = Topology::new("kvstore");
    topology.add_datacenter(Datacenter {
        id: DatacenterId(1),
        name: "east".into(),
        datacenter_type: DatacenterType::Primary,
    });
    topology.add_datacenter(Datacenter {
        id: DatacenterId(2),
        name: "west".into(),
        datacenter_type: DatacenterType::Secondary,
    });
    let mut params = Parameters::new(Policies::default());
    for (sn, dc) in [
        (PRIMARY_SN, DatacenterId(1)),
        (SECOND_PRIMARY_SN, DatacenterId(1)),
        (SECONDARY_SN, DatacenterId(2)),
    ] {
        let hostname = format!("host{}", sn.0);
        topology
            .add_storage_node(StorageNode {
                id: sn,
                datacenter: dc,
                hostname: hostname.clone(),
                registry_port: 5000,
            })
            .unwrap();
        params.add_storage_node(StorageNodeParams {
            id: sn,
            ha_hostname: hostname,
            ha_port_range: PortRange::new(HA_PORT_START, HA_PORT_START + 9),
            memory_mb: 8192,
            num_cpus: 4,
            capacity: 1,
        });
    }
    topology.add_shard(SHARD);
    (topology, params)
}

pub fn fast_settings() -> DeploySettings {
    DeploySettings {
        new_node_retry_time: Duration::from_millis(200),
        cleanup_retry_delay: Duration::from_millis(10),
        commit_attempts: 3,
    }
}

/// Replica params as the deployment would have stored them.
pub fn replica_params(id: ReplicaNodeId, sn: StorageNodeId, port: u16) -> ReplicaNodeParams {
    ReplicaNodeParams {
        id,
        storage_node: sn,
        disabled: false,
        ha_hostname: format!("host{}", sn.0),
        ha_port: port,
        helper_hosts: format!("host{}:{}", sn.0, port),
        storage_directory: None,
        node_type: kvplane::topology::NodeType::Electable,
        heap_mb: 0,
        cache_bytes: 0,
        cache_percent: 0,
        gc_threads: 0,
        policies: ParameterMap::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    pub storage_node: StorageNodeId,
    pub params: ParameterMap,
    pub sequence: u64,
}

/// Storage-node agent that records calls and replays scripted failures.
#[derive(Default)]
pub struct FakeAgents {
    calls: Mutex<Vec<CreateCall>>,
    failures: Mutex<VecDeque<RemoteError>>,
}

impl FakeAgents {
    pub fn fail_next(&self, err: RemoteError) {
        self.failures.lock().push_back(err);
    }

    pub fn calls(&self) -> Vec<CreateCall> {
        self.calls.lock().clone()
    }
}

struct FakeAgent {
    storage_node: StorageNodeId,
    shared: Arc<FakeAgents>,
}

impl ProvisioningAgent for FakeAgent {
    fn create_node(&self, params: &ParameterMap, metadata: &MetadataSet) -> Result<bool, RemoteError> {
        self.shared.calls.lock().push(CreateCall {
            storage_node: self.storage_node,
            params: params.clone(),
            sequence: metadata.sequence(),
        });
        match self.shared.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(true),
        }
    }
}

pub struct FakeResolver {
    pub agents: Arc<FakeAgents>,
}

impl AgentResolver for FakeResolver {
    fn storage_node_agent(
        &self,
        _topology: &Topology,
        storage_node: StorageNodeId,
    ) -> Result<Arc<dyn ProvisioningAgent>, RemoteError> {
        Ok(Arc::new(FakeAgent {
            storage_node,
            shared: self.agents.clone(),
        }))
    }
}

/// Storage-node view with an explicit set of deployed nodes.
#[derive(Default)]
pub struct FakeInspector {
    deployed: Mutex<BTreeSet<(StorageNodeId, ReplicaNodeId)>>,
    disabled: Mutex<Vec<(StorageNodeId, ReplicaNodeId)>>,
    unreachable: Mutex<bool>,
}

impl FakeInspector {
    pub fn deploy(&self, sn: StorageNodeId, node: ReplicaNodeId) {
        self.deployed.lock().insert((sn, node));
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock() = unreachable;
    }

    pub fn disabled(&self) -> Vec<(StorageNodeId, ReplicaNodeId)> {
        self.disabled.lock().clone()
    }
}

impl StorageNodeInspector for FakeInspector {
    fn is_deployed(&self, storage_node: StorageNodeId, node: ReplicaNodeId) -> Result<bool, CheckError> {
        if *self.unreachable.lock() {
            return Err(CheckError::Inspect {
                storage_node,
                reason: "connection refused".into(),
            });
        }
        Ok(self.deployed.lock().contains(&(storage_node, node)))
    }

    fn disable_node(&self, storage_node: StorageNodeId, node: ReplicaNodeId) -> Result<(), CheckError> {
        self.disabled.lock().push((storage_node, node));
        Ok(())
    }
}

/// Checker whose remedies never take effect, for exercising the retry loop.
#[derive(Default)]
pub struct StubbornChecker {
    pub checks: AtomicUsize,
}

impl TopologyChecker for StubbornChecker {
    fn check_location(&self, storage_node: StorageNodeId, node: ReplicaNodeId) -> Result<Remedy, CheckError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(Remedy::new(storage_node, node, RemedyKind::RemoveStrayMetadata))
    }

    fn apply_remedy(&self, _remedy: &Remedy) -> Result<bool, CheckError> {
        Ok(false)
    }
}

/// Store wrapper that reports a version conflict for the next `n` commits.
pub struct ConflictingStore {
    pub inner: Arc<InMemoryMetadataStore>,
    conflicts: AtomicUsize,
}

impl ConflictingStore {
    pub fn new(inner: Arc<InMemoryMetadataStore>, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts: AtomicUsize::new(conflicts),
        }
    }
}

impl MetadataStore for ConflictingStore {
    fn current_topology(&self) -> Result<Topology, MetadataError> {
        self.inner.current_topology()
    }

    fn current_parameters(&self) -> Result<Parameters, MetadataError> {
        self.inner.current_parameters()
    }

    fn node_params(&self, id: &ReplicaNodeId) -> Result<Option<ReplicaNodeParams>, MetadataError> {
        self.inner.node_params(id)
    }

    fn commit(&self, update: MetadataUpdate) -> Result<u64, MetadataError> {
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(MetadataError::VersionConflict {
                expected: update.expected_sequence,
                actual: update.expected_sequence + 1,
            });
        }
        self.inner.commit(update)
    }
}

/// A plan over an in-memory store with fake agents and the real checker.
pub struct Harness {
    pub store: Arc<InMemoryMetadataStore>,
    pub agents: Arc<FakeAgents>,
    pub inspector: Arc<FakeInspector>,
    pub monitor: Arc<Monitor>,
    pub plan: Arc<DeployPlan>,
}

impl Harness {
    pub fn new() -> Self {
        let (topology, params) = layout();
        Self::with_store(Arc::new(InMemoryMetadataStore::new(topology, params)))
    }

    pub fn with_store(store: Arc<InMemoryMetadataStore>) -> Self {
        let metadata: Arc<dyn MetadataStore> = store.clone();
        Self::build(store, metadata)
    }

    /// Plan whose commits go through `metadata` while `store` stays
    /// inspectable.
    pub fn build(store: Arc<InMemoryMetadataStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        let agents = Arc::new(FakeAgents::default());
        let inspector = Arc::new(FakeInspector::default());
        let monitor = Arc::new(Monitor::new(64));
        let checker = Arc::new(kvplane::control_plane::MetadataTopologyCheck::new(
            metadata.clone(),
            inspector.clone(),
        ));
        let plan = Arc::new(
            DeployPlan::new(
                7,
                metadata,
                Arc::new(FakeResolver {
                    agents: agents.clone(),
                }),
                checker,
                monitor.clone(),
            )
            .with_settings(fast_settings()),
        );
        Self {
            store,
            agents,
            inspector,
            monitor,
            plan,
        }
    }

    pub fn topology(&self) -> Topology {
        self.store.current_topology().unwrap()
    }
}
