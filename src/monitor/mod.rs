//! Telemetry buffering between monitored resources and the collector.

mod measurement;
mod registry;
mod repository;
mod service;

pub use measurement::{Measurement, MeasurementKind, Pruned};
pub use registry::{AgentRegistration, Monitor, MonitorRegistration};
pub use repository::{AgentRepository, Snapshot, SnapshotEntry, DEFAULT_REPOSITORY_CAPACITY};
pub use service::MonitoredService;
