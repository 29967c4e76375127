use super::collaborators::{MetadataError, MetadataStore, MetadataUpdate};
use crate::topology::{Parameters, ReplicaNodeId, ReplicaNodeParams, Topology, TopologyDocument};
use log::{debug, info};
use parking_lot::RwLock;
use std::fs;
use std::path::Path;

/// Metadata store held in memory, with optional persistence through
/// [`TopologyDocument`] files.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    state: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    topology: Topology,
    parameters: Parameters,
    commits: u64,
}

impl InMemoryMetadataStore {
    pub fn new(topology: Topology, parameters: Parameters) -> Self {
        Self {
            state: RwLock::new(StoreState {
                topology,
                parameters,
                commits: 0,
            }),
        }
    }

    pub fn from_document(document: TopologyDocument) -> Result<Self, MetadataError> {
        document.verify()?;
        let (topology, parameters) = document.into_parts();
        Ok(Self::new(topology, parameters))
    }

    pub fn export_document(&self) -> Result<TopologyDocument, MetadataError> {
        let state = self.state.read();
        Ok(TopologyDocument::new(
            state.topology.clone(),
            state.parameters.clone(),
        )?)
    }

    /// Replaces the stored metadata wholesale. Documents older than the
    /// current sequence are rejected as conflicts.
    pub fn import_document(&self, document: TopologyDocument) -> Result<u64, MetadataError> {
        document.verify()?;
        let mut state = self.state.write();
        let current = state.topology.sequence();
        if document.sequence < current {
            return Err(MetadataError::VersionConflict {
                expected: document.sequence,
                actual: current,
            });
        }
        let (topology, parameters) = document.into_parts();
        state.topology = topology;
        state.parameters = parameters;
        info!(
            "event=metadata_import sequence={} previous={}",
            state.topology.sequence(),
            current
        );
        Ok(state.topology.sequence())
    }

    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let bytes = fs::read(path)?;
        Self::from_document(TopologyDocument::decode(&bytes)?)
    }

    pub fn persist(&self, path: &Path) -> Result<(), MetadataError> {
        let bytes = self.export_document()?.encode()?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!("event=metadata_persist path={}", path.display());
        Ok(())
    }

    /// Number of successful commits since the store was created.
    pub fn commit_count(&self) -> u64 {
        self.state.read().commits
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn current_topology(&self) -> Result<Topology, MetadataError> {
        Ok(self.state.read().topology.clone())
    }

    fn current_parameters(&self) -> Result<Parameters, MetadataError> {
        Ok(self.state.read().parameters.clone())
    }

    fn node_params(&self, id: &ReplicaNodeId) -> Result<Option<ReplicaNodeParams>, MetadataError> {
        Ok(self.state.read().parameters.replica(id).cloned())
    }

    fn commit(&self, update: MetadataUpdate) -> Result<u64, MetadataError> {
        let mut state = self.state.write();
        let actual = state.topology.sequence();
        if update.expected_sequence != actual {
            return Err(MetadataError::VersionConflict {
                expected: update.expected_sequence,
                actual,
            });
        }
        let sequence = actual + 1;
        if let Some(topology) = update.topology {
            state.topology = topology;
        }
        state.topology.set_sequence(sequence);
        for id in &update.remove_replicas {
            state.parameters.remove_replica(id);
        }
        let upserts = update.upsert_replicas.len();
        for params in update.upsert_replicas {
            state.parameters.upsert_replica(params);
        }
        state.commits += 1;
        info!(
            "event=metadata_commit sequence={} upserts={} removals={}",
            sequence,
            upserts,
            update.remove_replicas.len()
        );
        Ok(sequence)
    }
}
