use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatacenterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageNodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShardId(pub u32);

/// A replica node is numbered within its shard: `rg2-rn3` is the third
/// replica ever allocated in shard 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaNodeId {
    pub shard: ShardId,
    pub node_num: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArbiterNodeId {
    pub shard: ShardId,
    pub node_num: u32,
}

impl ReplicaNodeId {
    pub fn new(shard: ShardId, node_num: u32) -> Self {
        Self { shard, node_num }
    }
}

impl ArbiterNodeId {
    pub fn new(shard: ShardId, node_num: u32) -> Self {
        Self { shard, node_num }
    }
}

/// Any resource that can be monitored or addressed by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceId {
    StorageNode(StorageNodeId),
    ReplicaNode(ReplicaNodeId),
    ArbiterNode(ArbiterNodeId),
    Admin(u32),
}

impl fmt::Display for DatacenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zn{}", self.0)
    }
}

impl fmt::Display for StorageNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sn{}", self.0)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rg{}", self.0)
    }
}

impl fmt::Display for ReplicaNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-rn{}", self.shard, self.node_num)
    }
}

impl fmt::Display for ArbiterNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-an{}", self.shard, self.node_num)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::StorageNode(id) => id.fmt(f),
            ResourceId::ReplicaNode(id) => id.fmt(f),
            ResourceId::ArbiterNode(id) => id.fmt(f),
            ResourceId::Admin(id) => write!(f, "admin{id}"),
        }
    }
}

impl From<StorageNodeId> for ResourceId {
    fn from(id: StorageNodeId) -> Self {
        ResourceId::StorageNode(id)
    }
}

impl From<ReplicaNodeId> for ResourceId {
    fn from(id: ReplicaNodeId) -> Self {
        ResourceId::ReplicaNode(id)
    }
}

impl From<ArbiterNodeId> for ResourceId {
    fn from(id: ArbiterNodeId) -> Self {
        ResourceId::ArbiterNode(id)
    }
}
