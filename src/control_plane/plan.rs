use super::collaborators::{AgentResolver, MetadataStore, TopologyChecker};
use crate::monitor::MonitorRegistration;
use crate::timeouts::{
    CLEANUP_RETRY_DELAY, COMMIT_CONFLICT_BACKOFF, DEFAULT_COMMIT_ATTEMPTS, NEW_NODE_RETRY_TIME,
};
use crate::topology::{Policies, ShardId};
use crate::util::{CancellationToken, RetryPolicy};
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploySettings {
    pub new_node_retry_time: Duration,
    pub cleanup_retry_delay: Duration,
    pub commit_attempts: usize,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            new_node_retry_time: NEW_NODE_RETRY_TIME,
            cleanup_retry_delay: CLEANUP_RETRY_DELAY,
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }
}

impl DeploySettings {
    pub fn from_policies(policies: &Policies, commit_attempts: usize) -> Self {
        Self {
            new_node_retry_time: policies.new_node_retry_time(),
            cleanup_retry_delay: policies.cleanup_retry_delay(),
            commit_attempts: commit_attempts.max(1),
        }
    }

    pub fn cleanup_policy(&self) -> RetryPolicy {
        RetryPolicy::until_deadline(self.cleanup_retry_delay, self.new_node_retry_time)
    }

    pub fn commit_policy(&self) -> RetryPolicy {
        // Jittered so planners racing on the same sequence spread out.
        RetryPolicy::fixed(self.commit_attempts, COMMIT_CONFLICT_BACKOFF).with_jitter(0.5)
    }
}

/// Shared context for the tasks of one deployment plan.
pub struct DeployPlan {
    id: u64,
    store: Arc<dyn MetadataStore>,
    agents: Arc<dyn AgentResolver>,
    checker: Arc<dyn TopologyChecker>,
    monitor: Arc<dyn MonitorRegistration>,
    settings: DeploySettings,
    /// Shards created earlier in the same plan, by plan-local index.
    shard_allocations: RwLock<Vec<Option<ShardId>>>,
    cleanup_token: CancellationToken,
}

impl DeployPlan {
    pub fn new(
        id: u64,
        store: Arc<dyn MetadataStore>,
        agents: Arc<dyn AgentResolver>,
        checker: Arc<dyn TopologyChecker>,
        monitor: Arc<dyn MonitorRegistration>,
    ) -> Self {
        Self {
            id,
            store,
            agents,
            checker,
            monitor,
            settings: DeploySettings::default(),
            shard_allocations: RwLock::new(Vec::new()),
            cleanup_token: CancellationToken::new(),
        }
    }

    pub fn with_settings(mut self, settings: DeploySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn agents(&self) -> &Arc<dyn AgentResolver> {
        &self.agents
    }

    pub fn checker(&self) -> &Arc<dyn TopologyChecker> {
        &self.checker
    }

    pub fn monitor(&self) -> &Arc<dyn MonitorRegistration> {
        &self.monitor
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    /// Reserves a slot for a shard the plan will create later.
    pub fn reserve_shard_slot(&self) -> usize {
        let mut allocations = self.shard_allocations.write();
        allocations.push(None);
        allocations.len() - 1
    }

    pub fn record_shard(&self, index: usize, shard: ShardId) {
        let mut allocations = self.shard_allocations.write();
        if allocations.len() <= index {
            allocations.resize(index + 1, None);
        }
        allocations[index] = Some(shard);
    }

    pub fn allocated_shard(&self, index: usize) -> Option<ShardId> {
        self.shard_allocations.read().get(index).copied().flatten()
    }

    pub fn cleanup_token(&self) -> &CancellationToken {
        &self.cleanup_token
    }

    /// Cancels the plan; running cleanup jobs stop at their next check.
    pub fn cancel(&self) {
        info!("event=plan_cancel plan={}", self.id);
        self.cleanup_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cleanup_token.is_cancelled()
    }
}
