use super::fixtures::{Harness, StubbornChecker, PRIMARY_SN, SHARD};
use kvplane::control_plane::{
    CleanupJob, CleanupOutcome, DeployNodeTask, MetadataStore, RemoteError, ShardTarget, Task,
};
use kvplane::topology::ReplicaNodeId;
use kvplane::util::{CancellationToken, RetryPolicy};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn stubborn_job(
    node: Option<ReplicaNodeId>,
    checker: Arc<StubbornChecker>,
    token: CancellationToken,
    policy: RetryPolicy,
) -> CleanupJob {
    CleanupJob::new(
        "DeployNode on sn1(host1:5000)",
        PRIMARY_SN,
        Arc::new(Mutex::new(node)),
        checker,
        token,
        policy,
    )
}

#[test]
fn nothing_resolved_means_nothing_to_clean() {
    let checker = Arc::new(StubbornChecker::default());
    let job = stubborn_job(
        None,
        checker.clone(),
        CancellationToken::new(),
        RetryPolicy::until_deadline(Duration::from_millis(10), Duration::from_secs(1)),
    );
    assert_eq!(job.run(), CleanupOutcome::Completed);
    assert_eq!(checker.checks.load(Ordering::SeqCst), 0);
}

#[test]
fn stray_metadata_from_a_failed_create_is_removed() {
    let harness = Harness::new();
    harness.agents.fail_next(RemoteError::Unreachable {
        storage_node: PRIMARY_SN,
        reason: "connection reset".into(),
    });
    let task = DeployNodeTask::new(
        harness.plan.clone(),
        &harness.topology(),
        PRIMARY_SN,
        ShardTarget::Existing(SHARD),
    )
    .unwrap();
    task.execute().unwrap_err();
    let node = task.resolved_node().unwrap();

    let outcome = task.cleanup_job().unwrap().run();

    assert_eq!(outcome, CleanupOutcome::Completed);
    assert!(harness.topology().replica(&node).is_none());
    assert!(harness.store.node_params(&node).unwrap().is_none());
}

#[test]
fn budget_exhaustion_gives_up_quietly() {
    let checker = Arc::new(StubbornChecker::default());
    let job = stubborn_job(
        Some(ReplicaNodeId::new(SHARD, 1)),
        checker.clone(),
        CancellationToken::new(),
        RetryPolicy::until_deadline(Duration::from_millis(10), Duration::from_millis(60)),
    );
    let started = Instant::now();
    let outcome = job.run();
    assert!(matches!(outcome, CleanupOutcome::TimedOut { attempts } if attempts >= 2));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(checker.checks.load(Ordering::SeqCst) >= 2);
}

#[test]
fn cancellation_interrupts_the_retry_sleep() {
    let checker = Arc::new(StubbornChecker::default());
    let token = CancellationToken::new();
    let job = stubborn_job(
        Some(ReplicaNodeId::new(SHARD, 1)),
        checker,
        token.clone(),
        RetryPolicy::until_deadline(Duration::from_secs(10), Duration::from_secs(60)),
    );
    let started = Instant::now();
    let handle = job.spawn().unwrap();
    thread::sleep(Duration::from_millis(50));
    token.cancel();
    assert_eq!(handle.join(), Some(CleanupOutcome::Interrupted));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn checker_error_aborts_the_loop() {
    let harness = Harness::new();
    harness.agents.fail_next(RemoteError::Unreachable {
        storage_node: PRIMARY_SN,
        reason: "connection reset".into(),
    });
    let task = DeployNodeTask::new(
        harness.plan.clone(),
        &harness.topology(),
        PRIMARY_SN,
        ShardTarget::Existing(SHARD),
    )
    .unwrap();
    task.execute().unwrap_err();
    harness.inspector.set_unreachable(true);

    let outcome = task.cleanup_job().unwrap().run();
    assert!(matches!(outcome, CleanupOutcome::Failed { reason } if reason.contains("sn1")));
    assert!(harness
        .topology()
        .replica(&task.resolved_node().unwrap())
        .is_some());
}
