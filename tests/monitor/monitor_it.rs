use kvplane::monitor::{Monitor, MonitorRegistration, MonitoredService};
use kvplane::service::{ConfigurableService, ServiceStatus};
use kvplane::topology::{ReplicaNodeId, ResourceId, ShardId};
use std::sync::Arc;

#[test]
fn monitored_service_status_flows_to_the_collector() {
    let monitor = Monitor::new(4);
    let resource = ResourceId::ReplicaNode(ReplicaNodeId::new(ShardId(2), 1));
    monitor.register_agent("host2", 5000, resource);
    let service = MonitoredService::new(resource, monitor.repository(&resource).unwrap());

    service.update(ServiceStatus::WaitingForDeploy);
    service.update(ServiceStatus::Running);
    service.stop(false).unwrap();

    let snapshot = monitor.collect(&resource).unwrap();
    assert_eq!(snapshot.status_changes, 4);
    assert!(snapshot.pruned.is_none());
    assert_eq!(service.status(), ServiceStatus::Stopped);
    assert_eq!(monitor.backlog(), 0);
}

#[test]
fn small_capacity_prunes_early_transitions() {
    let monitor = Monitor::new(2);
    let resource = ResourceId::ReplicaNode(ReplicaNodeId::new(ShardId(2), 2));
    let service = MonitoredService::new(resource, monitor.register("host2", 5000, resource));

    service.update(ServiceStatus::Running);
    service.update(ServiceStatus::ErrorRestarting);
    service.update(ServiceStatus::Running);

    let (collected_for, snapshot) = monitor.collect_all().pop().unwrap();
    assert_eq!(collected_for, resource);
    assert_eq!(snapshot.status_changes, 2);
    assert_eq!(snapshot.pruned.unwrap().status_changes(), 1);
}

#[test]
fn unregistered_resources_are_not_collected() {
    let monitor = Arc::new(Monitor::new(8));
    let resource = ResourceId::Admin(1);
    monitor.register_agent("admin-host", 5100, resource);
    assert_eq!(monitor.registered(), vec![resource]);
    assert!(monitor.unregister(&resource).is_some());
    assert!(monitor.collect(&resource).is_none());
    assert!(monitor.collect_all().is_empty());
}
