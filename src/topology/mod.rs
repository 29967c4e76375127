//! In-memory model of the store layout: datacenters, storage nodes, shards
//! and the replica/arbiter nodes each storage node hosts.
//!
//! A [`Topology`] is a value. Callers read a snapshot from the metadata
//! store, mutate their copy and commit it back; the `sequence` field is the
//! compare-and-commit version.

pub mod document;
pub mod ids;
mod keyed;
pub mod params;

pub use document::{DocumentError, TopologyDocument, TOPOLOGY_SCHEMA_VERSION};
pub use ids::{ArbiterNodeId, DatacenterId, ReplicaNodeId, ResourceId, ShardId, StorageNodeId};
pub use params::{
    HeapAndCacheSize, NodeType, ParameterMap, Parameters, Policies, PortRange, ReplicaNodeParams,
    StorageDirectory, StorageNodeParams,
};

use keyed::Keyed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatacenterType {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datacenter {
    pub id: DatacenterId,
    pub name: String,
    pub datacenter_type: DatacenterType,
}

impl Datacenter {
    /// Node type given to replicas created in this datacenter.
    pub fn default_replica_type(&self) -> NodeType {
        match self.datacenter_type {
            DatacenterType::Primary => NodeType::Electable,
            DatacenterType::Secondary => NodeType::Secondary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNode {
    pub id: StorageNodeId,
    pub datacenter: DatacenterId,
    pub hostname: String,
    pub registry_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaNode {
    pub id: ReplicaNodeId,
    pub storage_node: StorageNodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterNode {
    pub id: ArbiterNodeId,
    pub storage_node: StorageNodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub id: ShardId,
    #[serde(with = "keyed")]
    replicas: BTreeMap<ReplicaNodeId, ReplicaNode>,
    #[serde(with = "keyed")]
    arbiters: BTreeMap<ArbiterNodeId, ArbiterNode>,
    next_node_num: u32,
}

impl Shard {
    pub fn new(id: ShardId) -> Self {
        Self {
            id,
            replicas: BTreeMap::new(),
            arbiters: BTreeMap::new(),
            next_node_num: 1,
        }
    }

    pub fn replicas(&self) -> impl Iterator<Item = &ReplicaNode> {
        self.replicas.values()
    }

    pub fn arbiters(&self) -> impl Iterator<Item = &ArbiterNode> {
        self.arbiters.values()
    }

    pub fn replica(&self, id: &ReplicaNodeId) -> Option<&ReplicaNode> {
        self.replicas.get(id)
    }

    /// The replica of this shard hosted on `storage_node`, if any.
    pub fn replica_on(&self, storage_node: StorageNodeId) -> Option<&ReplicaNode> {
        self.replicas
            .values()
            .find(|replica| replica.storage_node == storage_node)
    }

    fn allocate_node_num(&mut self) -> u32 {
        let num = self.next_node_num;
        self.next_node_num = self.next_node_num.saturating_add(1);
        num
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("shard {0} not found")]
    UnknownShard(ShardId),
    #[error("storage node {0} not found")]
    UnknownStorageNode(StorageNodeId),
    #[error("datacenter {0} not found")]
    UnknownDatacenter(DatacenterId),
    #[error("replica node {0} not found")]
    UnknownReplica(ReplicaNodeId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub store_name: String,
    sequence: u64,
    #[serde(with = "keyed")]
    datacenters: BTreeMap<DatacenterId, Datacenter>,
    #[serde(with = "keyed")]
    storage_nodes: BTreeMap<StorageNodeId, StorageNode>,
    #[serde(with = "keyed")]
    shards: BTreeMap<ShardId, Shard>,
}

impl Topology {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            ..Self::default()
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub fn add_datacenter(&mut self, datacenter: Datacenter) {
        self.datacenters.insert(datacenter.id, datacenter);
    }

    pub fn add_storage_node(&mut self, node: StorageNode) -> Result<(), TopologyError> {
        if !self.datacenters.contains_key(&node.datacenter) {
            return Err(TopologyError::UnknownDatacenter(node.datacenter));
        }
        self.storage_nodes.insert(node.id, node);
        Ok(())
    }

    pub fn add_shard(&mut self, id: ShardId) -> &mut Shard {
        self.shards.entry(id).or_insert_with(|| Shard::new(id))
    }

    pub fn shard(&self, id: ShardId) -> Option<&Shard> {
        self.shards.get(&id)
    }

    pub fn shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards.values()
    }

    pub fn storage_node(&self, id: StorageNodeId) -> Option<&StorageNode> {
        self.storage_nodes.get(&id)
    }

    pub fn storage_nodes(&self) -> impl Iterator<Item = &StorageNode> {
        self.storage_nodes.values()
    }

    pub fn datacenter(&self, id: DatacenterId) -> Option<&Datacenter> {
        self.datacenters.get(&id)
    }

    /// The datacenter that hosts a storage node.
    pub fn datacenter_of(&self, storage_node: StorageNodeId) -> Result<&Datacenter, TopologyError> {
        let node = self
            .storage_node(storage_node)
            .ok_or(TopologyError::UnknownStorageNode(storage_node))?;
        self.datacenter(node.datacenter)
            .ok_or(TopologyError::UnknownDatacenter(node.datacenter))
    }

    pub fn replica(&self, id: &ReplicaNodeId) -> Option<&ReplicaNode> {
        self.shards.get(&id.shard).and_then(|shard| shard.replica(id))
    }

    /// Adds a new replica to `shard` on `storage_node` and returns its id.
    pub fn add_replica(
        &mut self,
        shard: ShardId,
        storage_node: StorageNodeId,
    ) -> Result<ReplicaNodeId, TopologyError> {
        if !self.storage_nodes.contains_key(&storage_node) {
            return Err(TopologyError::UnknownStorageNode(storage_node));
        }
        let shard = self
            .shards
            .get_mut(&shard)
            .ok_or(TopologyError::UnknownShard(shard))?;
        let id = ReplicaNodeId::new(shard.id, shard.allocate_node_num());
        shard.replicas.insert(id, ReplicaNode { id, storage_node });
        Ok(id)
    }

    pub fn add_arbiter(
        &mut self,
        shard: ShardId,
        storage_node: StorageNodeId,
    ) -> Result<ArbiterNodeId, TopologyError> {
        if !self.storage_nodes.contains_key(&storage_node) {
            return Err(TopologyError::UnknownStorageNode(storage_node));
        }
        let shard = self
            .shards
            .get_mut(&shard)
            .ok_or(TopologyError::UnknownShard(shard))?;
        let id = ArbiterNodeId::new(shard.id, shard.allocate_node_num());
        shard.arbiters.insert(id, ArbiterNode { id, storage_node });
        Ok(id)
    }

    pub fn remove_replica(&mut self, id: &ReplicaNodeId) -> Result<ReplicaNode, TopologyError> {
        self.shards
            .get_mut(&id.shard)
            .and_then(|shard| shard.replicas.remove(id))
            .ok_or(TopologyError::UnknownReplica(*id))
    }

    pub fn hosted_replica_ids(&self, storage_node: StorageNodeId) -> Vec<ReplicaNodeId> {
        self.shards
            .values()
            .flat_map(|shard| shard.replicas.values())
            .filter(|replica| replica.storage_node == storage_node)
            .map(|replica| replica.id)
            .collect()
    }

    pub fn hosted_arbiter_ids(&self, storage_node: StorageNodeId) -> Vec<ArbiterNodeId> {
        self.shards
            .values()
            .flat_map(|shard| shard.arbiters.values())
            .filter(|arbiter| arbiter.storage_node == storage_node)
            .map(|arbiter| arbiter.id)
            .collect()
    }
}

impl Keyed for Datacenter {
    type Key = DatacenterId;

    fn key(&self) -> DatacenterId {
        self.id
    }
}

impl Keyed for StorageNode {
    type Key = StorageNodeId;

    fn key(&self) -> StorageNodeId {
        self.id
    }
}

impl Keyed for Shard {
    type Key = ShardId;

    fn key(&self) -> ShardId {
        self.id
    }
}

impl Keyed for ReplicaNode {
    type Key = ReplicaNodeId;

    fn key(&self) -> ReplicaNodeId {
        self.id
    }
}

impl Keyed for ArbiterNode {
    type Key = ArbiterNodeId;

    fn key(&self) -> ArbiterNodeId {
        self.id
    }
}
