use super::fixtures::{layout, FakeAgents, FakeInspector, FakeResolver, PRIMARY_SN, SHARD};
use kvplane::config::ControlPlaneConfig;
use kvplane::control_plane::{
    DeployNodeTask, InMemoryMetadataStore, MetadataStore, ShardTarget, TaskRunner, TaskState,
};
use kvplane::fault::{ExitPolicy, ServiceFault, ShutdownMode};
use kvplane::monitor::MonitoredService;
use kvplane::service::{ConfigurableService, ServiceStatus};
use kvplane::topology::{ReplicaNodeId, ResourceId};
use kvplane::ControlPlane;
use std::sync::Arc;

fn open(config: ControlPlaneConfig) -> (ControlPlane, Arc<FakeAgents>) {
    let agents = Arc::new(FakeAgents::default());
    let control_plane = ControlPlane::open(
        config,
        Arc::new(FakeResolver {
            agents: agents.clone(),
        }),
        Arc::new(FakeInspector::default()),
    )
    .unwrap();
    (control_plane, agents)
}

#[test]
fn deploys_from_a_persisted_document_and_writes_it_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("topology.json");
    let (topology, params) = layout();
    InMemoryMetadataStore::new(topology, params)
        .persist(&path)
        .unwrap();

    let config = ControlPlaneConfig::from_yaml(&format!(
        "deploy:\n  commit_attempts: 2\nmetadata:\n  document_path: {}\n",
        path.display()
    ))
    .unwrap();
    let (control_plane, agents) = open(config);
    let plan = control_plane.new_plan();
    assert_eq!(plan.settings().commit_attempts, 2);
    assert_ne!(control_plane.new_plan().id(), plan.id());

    let topology = control_plane.store().current_topology().unwrap();
    let task =
        DeployNodeTask::new(plan.clone(), &topology, PRIMARY_SN, ShardTarget::Existing(SHARD))
            .unwrap();
    let outcome = TaskRunner::new(plan).run(&task);
    assert_eq!(outcome.state, TaskState::Succeeded);
    assert_eq!(agents.calls().len(), 1);

    assert!(control_plane.persist().unwrap());
    let reloaded = InMemoryMetadataStore::load(&path).unwrap();
    let node = ReplicaNodeId::new(SHARD, 1);
    assert!(reloaded.node_params(&node).unwrap().is_some());
    assert!(control_plane
        .monitor()
        .registration(&ResourceId::ReplicaNode(node))
        .is_some());
}

#[test]
fn without_a_document_the_store_starts_empty() {
    let config = ControlPlaneConfig::from_yaml("deploy:\n  cleanup_retry_delay_ms: 1234\n").unwrap();
    let (control_plane, _) = open(config);
    let topology = control_plane.store().current_topology().unwrap();
    assert_eq!(topology.sequence(), 0);
    assert_eq!(topology.storage_nodes().count(), 0);
    let parameters = control_plane.store().current_parameters().unwrap();
    assert_eq!(parameters.policies.cleanup_retry_delay_ms, 1234);
    assert!(!control_plane.persist().unwrap());
}

#[test]
fn fault_handler_follows_the_fault_section() {
    let config = ControlPlaneConfig::from_yaml(
        "fault:\n  default_exit_policy: no_restart\n  shutdown_mode: test\n",
    )
    .unwrap();
    let (control_plane, _) = open(config);
    let resource = ResourceId::ReplicaNode(ReplicaNodeId::new(SHARD, 1));
    let service = Arc::new(MonitoredService::new(
        resource,
        control_plane.monitor().register("host1", 5000, resource),
    ));
    service.update(ServiceStatus::Running);

    let handler = control_plane.fault_handler(service.clone());
    assert_eq!(handler.default_policy(), ExitPolicy::NoRestart);
    handler.handle("put", ServiceFault::internal("latch timeout"));
    assert!(handler.take_shutdown_ticket().unwrap().join());
    assert_eq!(service.status(), ServiceStatus::Stopped);
    assert_eq!(ShutdownMode::Test, control_plane.config().fault.shutdown_mode);
}
