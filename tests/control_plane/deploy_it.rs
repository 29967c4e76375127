use super::fixtures::{
    layout, replica_params, ConflictingStore, Harness, HA_PORT_START, PRIMARY_SN,
    SECOND_PRIMARY_SN, SECONDARY_SN, SHARD,
};
use kvplane::control_plane::{
    CleanupPolicy, DeployError, DeployNodeTask, InMemoryMetadataStore, MetadataStore,
    RemoteError, ShardTarget, TaskState,
};
use kvplane::topology::{ReplicaNodeId, ResourceId, ShardId, StorageDirectory, StorageNodeId};
use std::sync::Arc;

fn task(harness: &Harness, sn: StorageNodeId, shard: ShardTarget) -> DeployNodeTask {
    DeployNodeTask::new(harness.plan.clone(), &harness.topology(), sn, shard).unwrap()
}

#[test]
fn first_node_commits_metadata_then_creates_and_registers() {
    let harness = Harness::new();
    let task = task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD))
        .with_storage_directory(StorageDirectory::new("/disk1", 1 << 30));

    assert_eq!(task.execute().unwrap(), TaskState::Succeeded);

    let node = ReplicaNodeId::new(SHARD, 1);
    assert_eq!(task.resolved_node(), Some(node));
    assert_eq!(harness.store.commit_count(), 1);
    let stored = harness.store.node_params(&node).unwrap().unwrap();
    assert_eq!(stored.ha_port, HA_PORT_START);
    assert_eq!(stored.helper_hosts, format!("host1:{HA_PORT_START}"));
    assert!(stored.node_type.is_electable());
    assert!(stored.heap_mb > 0);

    let calls = harness.agents.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].storage_node, PRIMARY_SN);
    assert_eq!(calls[0].params.get("nodeId"), Some("rg1-rn1"));
    assert_eq!(calls[0].params.get("storageDirectory"), Some("/disk1"));
    assert_eq!(calls[0].sequence, harness.topology().sequence());

    let registration = harness
        .monitor
        .registration(&ResourceId::ReplicaNode(node))
        .unwrap();
    assert_eq!(registration.host, "host1");
    assert_eq!(registration.port, 5000);
}

#[test]
fn later_nodes_use_existing_members_as_helpers() {
    let harness = Harness::new();
    task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD))
        .execute()
        .unwrap();
    let second = task(&harness, SECONDARY_SN, ShardTarget::Existing(SHARD));
    assert_eq!(second.execute().unwrap(), TaskState::Succeeded);

    let node = second.resolved_node().unwrap();
    assert_eq!(node, ReplicaNodeId::new(SHARD, 2));
    let stored = harness.store.node_params(&node).unwrap().unwrap();
    assert_eq!(stored.helper_hosts, format!("host1:{HA_PORT_START}"));
    assert!(!stored.node_type.is_electable());
    assert_eq!(second.to_string(), "DeployNode rg1-rn2 on sn3(host3:5000)");
}

#[test]
fn rerun_after_remote_failure_adopts_the_committed_node() {
    let harness = Harness::new();
    harness.agents.fail_next(RemoteError::Unreachable {
        storage_node: PRIMARY_SN,
        reason: "connect timed out".into(),
    });
    let task = task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD));

    let err = task.execute().unwrap_err();
    assert!(matches!(err, DeployError::Remote(_)));
    assert_eq!(err.cleanup_policy(), CleanupPolicy::RunCleanup);
    assert_eq!(harness.store.commit_count(), 1);

    assert_eq!(task.execute().unwrap(), TaskState::Succeeded);
    assert_eq!(harness.store.commit_count(), 1);
    let topology = harness.topology();
    assert_eq!(topology.hosted_replica_ids(PRIMARY_SN).len(), 1);
    let calls = harness.agents.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].params, calls[1].params);
}

#[test]
fn fresh_task_for_the_same_placement_is_idempotent() {
    let harness = Harness::new();
    task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD))
        .execute()
        .unwrap();
    let again = task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD));
    assert_eq!(again.execute().unwrap(), TaskState::Succeeded);
    assert_eq!(again.resolved_node(), Some(ReplicaNodeId::new(SHARD, 1)));
    assert_eq!(harness.store.commit_count(), 1);
}

#[test]
fn missing_shard_is_fatal_without_cleanup() {
    let harness = Harness::new();
    let err = task(&harness, PRIMARY_SN, ShardTarget::Existing(ShardId(9)))
        .execute()
        .unwrap_err();
    assert!(matches!(err, DeployError::ShardNotFound(ShardId(9))));
    assert_eq!(err.cleanup_policy(), CleanupPolicy::NoCleanupJobs);
    assert_eq!(harness.store.commit_count(), 0);
    assert!(harness.agents.calls().is_empty());
}

#[test]
fn plan_index_resolves_once_the_shard_is_recorded() {
    let harness = Harness::new();
    let slot = harness.plan.reserve_shard_slot();
    let task = task(&harness, PRIMARY_SN, ShardTarget::PlanIndex(slot));
    assert!(matches!(
        task.execute().unwrap_err(),
        DeployError::UnresolvedShard(index) if index == slot
    ));

    harness.plan.record_shard(slot, SHARD);
    assert_eq!(task.execute().unwrap(), TaskState::Succeeded);
}

#[test]
fn lone_secondary_node_is_rejected() {
    let harness = Harness::new();
    let err = task(&harness, SECONDARY_SN, ShardTarget::Existing(SHARD))
        .execute()
        .unwrap_err();
    assert!(matches!(err, DeployError::NotElectable { .. }));
    assert!(err.cleanup_policy().is_fatal());
    assert_eq!(harness.store.commit_count(), 0);
}

#[test]
fn remote_invalid_state_stops_further_cleanup() {
    let harness = Harness::new();
    harness.agents.fail_next(RemoteError::InvalidState {
        storage_node: SECOND_PRIMARY_SN,
        reason: "node directory already in use".into(),
    });
    let err = task(&harness, SECOND_PRIMARY_SN, ShardTarget::Existing(SHARD))
        .execute()
        .unwrap_err();
    assert!(matches!(err, DeployError::RemoteInvalidState(_)));
    assert_eq!(err.cleanup_policy(), CleanupPolicy::NoCleanupJobs);
}

#[test]
fn adopted_node_without_params_cancels_the_plan() {
    let (mut topology, params) = layout();
    topology.add_replica(SHARD, PRIMARY_SN).unwrap();
    let harness = Harness::with_store(Arc::new(InMemoryMetadataStore::new(topology, params)));
    let err = task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD))
        .execute()
        .unwrap_err();
    assert!(matches!(err, DeployError::MissingNodeParams(_)));
    assert_eq!(err.cleanup_policy(), CleanupPolicy::PlanCancel);
    assert!(harness.agents.calls().is_empty());
}

#[test]
fn member_without_params_fails_instead_of_self_bootstrapping() {
    let (mut topology, params) = layout();
    let sibling = topology.add_replica(SHARD, SECOND_PRIMARY_SN).unwrap();
    let harness = Harness::with_store(Arc::new(InMemoryMetadataStore::new(topology, params)));
    let task = task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD));

    let err = task.execute().unwrap_err();

    assert!(matches!(err, DeployError::MissingNodeParams(id) if id == sibling));
    assert_eq!(err.cleanup_policy(), CleanupPolicy::PlanCancel);
    assert_eq!(task.resolved_node(), None);
    assert_eq!(harness.store.commit_count(), 0);
    assert!(harness.agents.calls().is_empty());
    assert!(harness.store.node_params(&ReplicaNodeId::new(SHARD, 2)).unwrap().is_none());
}

#[test]
fn adopted_node_uses_its_stored_params() {
    let (mut topology, mut params) = layout();
    let node = topology.add_replica(SHARD, PRIMARY_SN).unwrap();
    params.upsert_replica(replica_params(node, PRIMARY_SN, 5015));
    let harness = Harness::with_store(Arc::new(InMemoryMetadataStore::new(topology, params)));
    task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD))
        .execute()
        .unwrap();
    assert_eq!(harness.agents.calls()[0].params.get("haPort"), Some("5015"));
    assert_eq!(harness.store.commit_count(), 0);
}

#[test]
fn commit_conflict_is_retried_against_fresh_metadata() {
    let (topology, params) = layout();
    let store = Arc::new(InMemoryMetadataStore::new(topology, params));
    let metadata = Arc::new(ConflictingStore::new(store.clone(), 1));
    let harness = Harness::build(store, metadata);
    let task = task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD));
    assert_eq!(task.execute().unwrap(), TaskState::Succeeded);
    assert_eq!(harness.store.commit_count(), 1);
}

#[test]
fn persistent_commit_conflicts_give_up() {
    let (topology, params) = layout();
    let store = Arc::new(InMemoryMetadataStore::new(topology, params));
    let metadata = Arc::new(ConflictingStore::new(store.clone(), usize::MAX));
    let harness = Harness::build(store, metadata);
    let err = task(&harness, PRIMARY_SN, ShardTarget::Existing(SHARD))
        .execute()
        .unwrap_err();
    assert!(matches!(err, DeployError::CommitConflict { attempts: 3 }));
    assert_eq!(harness.store.commit_count(), 0);
    assert_eq!(task_count_on(&harness, PRIMARY_SN), 0);
}

fn task_count_on(harness: &Harness, sn: StorageNodeId) -> usize {
    harness.topology().hosted_replica_ids(sn).len()
}
