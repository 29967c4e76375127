use super::ids::{ReplicaNodeId, StorageNodeId};
use super::keyed::{self, Keyed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_NEW_NODE_RETRY_TIME_MS: u64 = 300_000;
pub const DEFAULT_CLEANUP_RETRY_DELAY_MS: u64 = 10_000;
const DEFAULT_CACHE_PERCENT: u32 = 70;
const DEFAULT_HEAP_PERCENT: u32 = 85;
const DEFAULT_ARBITER_HEAP_MB: u64 = 128;
const DEFAULT_MAX_HEAP_MB: u64 = 32_767;
const GC_THREADS_FULL_SHARE_CPUS: u32 = 8;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Flat string parameters, the form handed to remote storage-node agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMap(BTreeMap<String, String>);

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|value| value.parse().ok())
    }

    pub fn merge(&mut self, other: &ParameterMap) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Store-wide policy values that seed every new node's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policies {
    pub new_node_retry_time_ms: u64,
    pub cleanup_retry_delay_ms: u64,
    pub replica_cache_percent: u32,
    pub replica_heap_percent: u32,
    pub arbiter_heap_mb: u64,
    pub max_heap_mb: u64,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            new_node_retry_time_ms: DEFAULT_NEW_NODE_RETRY_TIME_MS,
            cleanup_retry_delay_ms: DEFAULT_CLEANUP_RETRY_DELAY_MS,
            replica_cache_percent: DEFAULT_CACHE_PERCENT,
            replica_heap_percent: DEFAULT_HEAP_PERCENT,
            arbiter_heap_mb: DEFAULT_ARBITER_HEAP_MB,
            max_heap_mb: DEFAULT_MAX_HEAP_MB,
        }
    }
}

impl Policies {
    pub fn new_node_retry_time(&self) -> Duration {
        Duration::from_millis(self.new_node_retry_time_ms)
    }

    pub fn cleanup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_retry_delay_ms)
    }

    pub fn to_param_map(&self) -> ParameterMap {
        let mut map = ParameterMap::new();
        map.set("newNodeRetryTimeMs", self.new_node_retry_time_ms);
        map.set("cleanupRetryDelayMs", self.cleanup_retry_delay_ms);
        map.set("cachePercent", self.replica_cache_percent);
        map.set("heapPercent", self.replica_heap_percent);
        map
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNodeParams {
    pub id: StorageNodeId,
    pub ha_hostname: String,
    pub ha_port_range: PortRange,
    /// Physical memory available to hosted nodes; zero leaves sizing to the node.
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub num_cpus: u32,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

fn default_capacity() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapAndCacheSize {
    pub heap_mb: u64,
    pub cache_bytes: u64,
    pub cache_percent: u32,
}

impl HeapAndCacheSize {
    pub fn is_specified(&self) -> bool {
        self.heap_mb != 0
    }
}

impl StorageNodeParams {
    pub fn display_id_and_host(&self) -> String {
        format!("{}({})", self.id, self.ha_hostname)
    }

    /// Splits the storage node's memory between the replicas it hosts after
    /// setting aside a fixed share for each arbiter. Counts must already
    /// include the node being sized.
    pub fn calculate_heap_and_cache(
        &self,
        policies: &Policies,
        replicas_on_sn: usize,
        cache_percent: u32,
        arbiters_on_sn: usize,
    ) -> HeapAndCacheSize {
        if self.memory_mb == 0 || replicas_on_sn == 0 {
            return HeapAndCacheSize::default();
        }
        let usable = self.memory_mb.saturating_mul(u64::from(policies.replica_heap_percent)) / 100;
        let arbiter_share = policies
            .arbiter_heap_mb
            .saturating_mul(arbiters_on_sn as u64);
        let per_replica = usable.saturating_sub(arbiter_share) / replicas_on_sn as u64;
        let heap_mb = per_replica.min(policies.max_heap_mb);
        if heap_mb == 0 {
            return HeapAndCacheSize::default();
        }
        let cache_percent = cache_percent.min(100);
        HeapAndCacheSize {
            heap_mb,
            cache_bytes: heap_mb.saturating_mul(BYTES_PER_MB) / 100 * u64::from(cache_percent),
            cache_percent,
        }
    }

    /// Garbage-collector worker threads per hosted node; zero when the CPU
    /// count is not configured.
    pub fn calculate_gc_threads(&self) -> u32 {
        match self.num_cpus {
            0 => 0,
            n if n <= GC_THREADS_FULL_SHARE_CPUS => n,
            n => GC_THREADS_FULL_SHARE_CPUS + (n - GC_THREADS_FULL_SHARE_CPUS) * 5 / 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Electable,
    Secondary,
}

impl NodeType {
    pub fn is_electable(&self) -> bool {
        matches!(self, NodeType::Electable)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Electable => f.write_str("ELECTABLE"),
            NodeType::Secondary => f.write_str("SECONDARY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDirectory {
    pub path: String,
    pub size_bytes: u64,
}

impl StorageDirectory {
    pub fn new(path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }
}

/// Everything a storage-node agent needs to create and start a replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaNodeParams {
    pub id: ReplicaNodeId,
    pub storage_node: StorageNodeId,
    pub disabled: bool,
    pub ha_hostname: String,
    pub ha_port: u16,
    pub helper_hosts: String,
    pub storage_directory: Option<StorageDirectory>,
    pub node_type: NodeType,
    pub heap_mb: u64,
    pub cache_bytes: u64,
    pub cache_percent: u32,
    pub gc_threads: u32,
    #[serde(default)]
    pub policies: ParameterMap,
}

impl ReplicaNodeParams {
    pub fn node_host_port(&self) -> String {
        format!("{}:{}", self.ha_hostname, self.ha_port)
    }

    pub fn set_heap_and_cache(&mut self, sizing: HeapAndCacheSize) {
        self.heap_mb = sizing.heap_mb;
        self.cache_bytes = sizing.cache_bytes;
        self.cache_percent = sizing.cache_percent;
    }

    pub fn to_param_map(&self) -> ParameterMap {
        let mut map = self.policies.clone();
        map.set("nodeId", self.id);
        map.set("storageNodeId", self.storage_node);
        map.set("disabled", self.disabled);
        map.set("haHostname", &self.ha_hostname);
        map.set("haPort", self.ha_port);
        map.set("nodeHostPort", self.node_host_port());
        map.set("helperHosts", &self.helper_hosts);
        map.set("nodeType", self.node_type);
        if let Some(dir) = &self.storage_directory {
            map.set("storageDirectory", &dir.path);
            map.set("storageDirectorySize", dir.size_bytes);
        }
        if self.heap_mb != 0 {
            map.set("heapMB", self.heap_mb);
        }
        if self.cache_bytes != 0 {
            map.set("cacheSize", self.cache_bytes);
            map.set("cachePercent", self.cache_percent);
        }
        if self.gc_threads != 0 {
            map.set("gcThreads", self.gc_threads);
        }
        map
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub policies: Policies,
    #[serde(with = "keyed", default)]
    storage_nodes: BTreeMap<StorageNodeId, StorageNodeParams>,
    #[serde(with = "keyed", default)]
    replicas: BTreeMap<ReplicaNodeId, ReplicaNodeParams>,
}

impl Parameters {
    pub fn new(policies: Policies) -> Self {
        Self {
            policies,
            ..Self::default()
        }
    }

    pub fn copy_policies(&self) -> ParameterMap {
        self.policies.to_param_map()
    }

    pub fn add_storage_node(&mut self, params: StorageNodeParams) {
        self.storage_nodes.insert(params.id, params);
    }

    pub fn storage_node(&self, id: StorageNodeId) -> Option<&StorageNodeParams> {
        self.storage_nodes.get(&id)
    }

    pub fn replica(&self, id: &ReplicaNodeId) -> Option<&ReplicaNodeParams> {
        self.replicas.get(id)
    }

    pub fn replicas(&self) -> impl Iterator<Item = &ReplicaNodeParams> {
        self.replicas.values()
    }

    pub fn upsert_replica(&mut self, params: ReplicaNodeParams) {
        self.replicas.insert(params.id, params);
    }

    pub fn remove_replica(&mut self, id: &ReplicaNodeId) -> Option<ReplicaNodeParams> {
        self.replicas.remove(id)
    }
}

impl Keyed for StorageNodeParams {
    type Key = StorageNodeId;

    fn key(&self) -> StorageNodeId {
        self.id
    }
}

impl Keyed for ReplicaNodeParams {
    type Key = ReplicaNodeId;

    fn key(&self) -> ReplicaNodeId {
        self.id
    }
}
