//! Seams between deployment tasks and the systems they drive: the metadata
//! store, the storage-node agents, port allocation and topology repair.

use crate::topology::{
    DocumentError, ParameterMap, Parameters, ReplicaNodeId, ReplicaNodeParams, StorageNodeId,
    Topology, TopologyError,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata version conflict: expected sequence {expected}, store is at {actual}")]
    VersionConflict { expected: u64, actual: u64 },
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("metadata store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

impl MetadataError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, MetadataError::VersionConflict { .. })
    }
}

/// One atomic change to topology and parameters, applied only if the store
/// is still at `expected_sequence`.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub expected_sequence: u64,
    pub topology: Option<Topology>,
    pub upsert_replicas: Vec<ReplicaNodeParams>,
    pub remove_replicas: Vec<ReplicaNodeId>,
}

impl MetadataUpdate {
    pub fn new(expected_sequence: u64) -> Self {
        Self {
            expected_sequence,
            ..Self::default()
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn upsert_replica(mut self, params: ReplicaNodeParams) -> Self {
        self.upsert_replicas.push(params);
        self
    }

    pub fn remove_replica(mut self, id: ReplicaNodeId) -> Self {
        self.remove_replicas.push(id);
        self
    }
}

pub trait MetadataStore: Send + Sync {
    fn current_topology(&self) -> Result<Topology, MetadataError>;
    fn current_parameters(&self) -> Result<Parameters, MetadataError>;
    fn node_params(&self, id: &ReplicaNodeId) -> Result<Option<ReplicaNodeParams>, MetadataError>;
    /// Applies `update` and returns the new topology sequence.
    fn commit(&self, update: MetadataUpdate) -> Result<u64, MetadataError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("storage node {storage_node} reported invalid state: {reason}")]
    InvalidState {
        storage_node: StorageNodeId,
        reason: String,
    },
    #[error("storage node {storage_node} unreachable: {reason}")]
    Unreachable {
        storage_node: StorageNodeId,
        reason: String,
    },
    #[error("storage node {storage_node} rejected request: {reason}")]
    Rejected {
        storage_node: StorageNodeId,
        reason: String,
    },
}

/// Metadata shipped alongside the parameters of a new node so it starts
/// with a current view of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSet {
    pub topology: Topology,
}

impl MetadataSet {
    pub fn new(topology: Topology) -> Self {
        Self { topology }
    }

    pub fn sequence(&self) -> u64 {
        self.topology.sequence()
    }
}

pub trait ProvisioningAgent: Send + Sync {
    /// Creates and starts the node described by `params`. Returns `false`
    /// when the node already existed on the storage node.
    fn create_node(&self, params: &ParameterMap, metadata: &MetadataSet)
        -> Result<bool, RemoteError>;
}

pub trait AgentResolver: Send + Sync {
    fn storage_node_agent(
        &self,
        topology: &Topology,
        storage_node: StorageNodeId,
    ) -> Result<Arc<dyn ProvisioningAgent>, RemoteError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("no free HA port left on {storage_node} in range {start}-{end}")]
    Exhausted {
        storage_node: StorageNodeId,
        start: u16,
        end: u16,
    },
    #[error("storage node {0} has no parameters")]
    UnknownStorageNode(StorageNodeId),
}

pub trait PortAllocator {
    fn next_port(&mut self, storage_node: StorageNodeId) -> Result<u16, PortError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemedyKind {
    NoOp,
    /// Node is in metadata but was never created on the storage node.
    RemoveStrayMetadata,
    /// Node runs on the storage node but is unknown to the topology.
    MarkDisabled,
    /// Parameters place the node on a different storage node than topology.
    RepairParams,
}

impl fmt::Display for RemedyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemedyKind::NoOp => "no_op",
            RemedyKind::RemoveStrayMetadata => "remove_stray_metadata",
            RemedyKind::MarkDisabled => "mark_disabled",
            RemedyKind::RepairParams => "repair_params",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remedy {
    pub storage_node: StorageNodeId,
    pub node: ReplicaNodeId,
    pub kind: RemedyKind,
}

impl Remedy {
    pub fn new(storage_node: StorageNodeId, node: ReplicaNodeId, kind: RemedyKind) -> Self {
        Self {
            storage_node,
            node,
            kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("cannot inspect storage node {storage_node}: {reason}")]
    Inspect {
        storage_node: StorageNodeId,
        reason: String,
    },
}

/// Reconciles the desired placement of a node with what the storage node
/// actually hosts.
pub trait TopologyChecker: Send + Sync {
    fn check_location(
        &self,
        storage_node: StorageNodeId,
        node: ReplicaNodeId,
    ) -> Result<Remedy, CheckError>;

    /// Returns whether the remedy took effect.
    fn apply_remedy(&self, remedy: &Remedy) -> Result<bool, CheckError>;
}
