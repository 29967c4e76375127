use super::collaborators::{
    CheckError, MetadataError, MetadataStore, MetadataUpdate, Remedy, RemedyKind,
    TopologyChecker,
};
use crate::topology::{ReplicaNodeId, StorageNodeId};
use log::{info, warn};
use std::sync::Arc;

/// What a storage node actually hosts, as reported by its agent.
pub trait StorageNodeInspector: Send + Sync {
    fn is_deployed(
        &self,
        storage_node: StorageNodeId,
        node: ReplicaNodeId,
    ) -> Result<bool, CheckError>;

    /// Disables a node so the storage node stops restarting it.
    fn disable_node(&self, storage_node: StorageNodeId, node: ReplicaNodeId)
        -> Result<(), CheckError>;
}

/// Compares metadata placement with storage-node reality and repairs the
/// metadata side through compare-and-commit.
pub struct MetadataTopologyCheck {
    store: Arc<dyn MetadataStore>,
    inspector: Arc<dyn StorageNodeInspector>,
}

impl MetadataTopologyCheck {
    pub fn new(store: Arc<dyn MetadataStore>, inspector: Arc<dyn StorageNodeInspector>) -> Self {
        Self { store, inspector }
    }

    fn remove_stray_metadata(&self, remedy: &Remedy) -> Result<bool, CheckError> {
        let mut topology = self.store.current_topology()?;
        let expected = topology.sequence();
        let in_topology = topology
            .replica(&remedy.node)
            .is_some_and(|replica| replica.storage_node == remedy.storage_node);
        let has_params = self.store.node_params(&remedy.node)?.is_some();
        if !in_topology && !has_params {
            return Ok(true);
        }
        let mut update = MetadataUpdate::new(expected);
        if in_topology {
            topology
                .remove_replica(&remedy.node)
                .map_err(MetadataError::from)?;
            update = update.with_topology(topology);
        }
        if has_params {
            update = update.remove_replica(remedy.node);
        }
        self.commit(update, remedy)
    }

    fn repair_params(&self, remedy: &Remedy) -> Result<bool, CheckError> {
        let topology = self.store.current_topology()?;
        let parameters = self.store.current_parameters()?;
        let Some(placed) = topology.replica(&remedy.node) else {
            return Ok(false);
        };
        let Some(current) = parameters.replica(&remedy.node) else {
            return Ok(false);
        };
        let mut repaired = current.clone();
        repaired.storage_node = placed.storage_node;
        if let Some(sn_params) = parameters.storage_node(placed.storage_node) {
            repaired.ha_hostname = sn_params.ha_hostname.clone();
        }
        let update = MetadataUpdate::new(topology.sequence()).upsert_replica(repaired);
        self.commit(update, remedy)
    }

    fn commit(&self, update: MetadataUpdate, remedy: &Remedy) -> Result<bool, CheckError> {
        match self.store.commit(update) {
            Ok(sequence) => {
                info!(
                    "event=topology_remedy_applied node={} sn={} remedy={} sequence={}",
                    remedy.node, remedy.storage_node, remedy.kind, sequence
                );
                Ok(true)
            }
            Err(err) if err.is_conflict() => {
                warn!(
                    "event=topology_remedy_conflict node={} sn={} remedy={} error={}",
                    remedy.node, remedy.storage_node, remedy.kind, err
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl TopologyChecker for MetadataTopologyCheck {
    fn check_location(
        &self,
        storage_node: StorageNodeId,
        node: ReplicaNodeId,
    ) -> Result<Remedy, CheckError> {
        let topology = self.store.current_topology()?;
        let params = self.store.node_params(&node)?;
        let deployed = self.inspector.is_deployed(storage_node, node)?;
        let placed_here = topology
            .replica(&node)
            .is_some_and(|replica| replica.storage_node == storage_node);
        let kind = if placed_here {
            match params {
                _ if !deployed => RemedyKind::RemoveStrayMetadata,
                Some(params) if params.storage_node != storage_node => RemedyKind::RepairParams,
                _ => RemedyKind::NoOp,
            }
        } else if deployed {
            RemedyKind::MarkDisabled
        } else if params.is_some_and(|params| params.storage_node == storage_node) {
            RemedyKind::RemoveStrayMetadata
        } else {
            RemedyKind::NoOp
        };
        Ok(Remedy::new(storage_node, node, kind))
    }

    fn apply_remedy(&self, remedy: &Remedy) -> Result<bool, CheckError> {
        match remedy.kind {
            RemedyKind::NoOp => Ok(true),
            RemedyKind::RemoveStrayMetadata => self.remove_stray_metadata(remedy),
            RemedyKind::RepairParams => self.repair_params(remedy),
            RemedyKind::MarkDisabled => {
                self.inspector
                    .disable_node(remedy.storage_node, remedy.node)?;
                info!(
                    "event=topology_remedy_applied node={} sn={} remedy={}",
                    remedy.node, remedy.storage_node, remedy.kind
                );
                Ok(true)
            }
        }
    }
}
