use super::collaborators::{PortAllocator, PortError};
use crate::topology::{Parameters, PortRange, StorageNodeId, Topology};
use std::collections::{BTreeMap, BTreeSet};

/// Hands out HA ports from each storage node's configured range, skipping
/// ports already taken by replicas hosted there.
///
/// Only replicas hold HA ports. Arbiters carry no parameters in this model,
/// so an arbiter hosted on the storage node reserves nothing from its range.
#[derive(Debug, Clone)]
pub struct PortTracker {
    ranges: BTreeMap<StorageNodeId, PortRange>,
    used: BTreeMap<StorageNodeId, BTreeSet<u16>>,
}

impl PortTracker {
    pub fn new(topology: &Topology, params: &Parameters) -> Self {
        let mut ranges = BTreeMap::new();
        let mut used: BTreeMap<StorageNodeId, BTreeSet<u16>> = BTreeMap::new();
        for node in topology.storage_nodes() {
            if let Some(sn_params) = params.storage_node(node.id) {
                ranges.insert(node.id, sn_params.ha_port_range);
            }
            let ports = used.entry(node.id).or_default();
            for replica in topology.hosted_replica_ids(node.id) {
                if let Some(replica_params) = params.replica(&replica) {
                    ports.insert(replica_params.ha_port);
                }
            }
        }
        Self { ranges, used }
    }

    pub fn used_ports(&self, storage_node: StorageNodeId) -> impl Iterator<Item = u16> + '_ {
        self.used
            .get(&storage_node)
            .into_iter()
            .flat_map(|ports| ports.iter().copied())
    }
}

impl PortAllocator for PortTracker {
    fn next_port(&mut self, storage_node: StorageNodeId) -> Result<u16, PortError> {
        let range = *self
            .ranges
            .get(&storage_node)
            .ok_or(PortError::UnknownStorageNode(storage_node))?;
        let used = self.used.entry(storage_node).or_default();
        let port = range
            .iter()
            .find(|port| !used.contains(port))
            .ok_or(PortError::Exhausted {
                storage_node,
                start: range.start,
                end: range.end,
            })?;
        used.insert(port);
        Ok(port)
    }
}
