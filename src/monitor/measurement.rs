use crate::service::ServiceStatus;
use crate::topology::ResourceId;
use std::collections::BTreeMap;

/// One telemetry record produced by a monitored resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub resource: ResourceId,
    pub recorded_at_ms: u64,
    pub kind: MeasurementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementKind {
    ServiceStatusChange {
        status: ServiceStatus,
    },
    Performance {
        operations: u64,
        errors: u64,
        average_latency_us: u64,
    },
    Log {
        level: log::Level,
        message: String,
    },
    PlanStateChange {
        plan_id: u64,
        state: String,
    },
}

impl MeasurementKind {
    pub fn label(&self) -> &'static str {
        match self {
            MeasurementKind::ServiceStatusChange { .. } => "service_status_change",
            MeasurementKind::Performance { .. } => "performance",
            MeasurementKind::Log { .. } => "log",
            MeasurementKind::PlanStateChange { .. } => "plan_state_change",
        }
    }
}

impl Measurement {
    pub fn new(resource: ResourceId, recorded_at_ms: u64, kind: MeasurementKind) -> Self {
        Self {
            resource,
            recorded_at_ms,
            kind,
        }
    }

    pub fn status_change(resource: ResourceId, recorded_at_ms: u64, status: ServiceStatus) -> Self {
        Self::new(
            resource,
            recorded_at_ms,
            MeasurementKind::ServiceStatusChange { status },
        )
    }

    pub fn is_status_change(&self) -> bool {
        matches!(self.kind, MeasurementKind::ServiceStatusChange { .. })
    }
}

/// Aggregate standing in for every measurement evicted from a repository
/// since its last drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pruned {
    count: u64,
    status_changes: u64,
    by_kind: BTreeMap<&'static str, u64>,
    earliest_ms: Option<u64>,
    latest_ms: Option<u64>,
}

impl Pruned {
    pub fn record(&mut self, measurement: &Measurement) {
        self.count += 1;
        if measurement.is_status_change() {
            self.status_changes += 1;
        }
        *self.by_kind.entry(measurement.kind.label()).or_insert(0) += 1;
        let at = measurement.recorded_at_ms;
        self.earliest_ms = Some(self.earliest_ms.map_or(at, |earliest| earliest.min(at)));
        self.latest_ms = Some(self.latest_ms.map_or(at, |latest| latest.max(at)));
    }

    pub fn exists(&self) -> bool {
        self.count > 0
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn status_changes(&self) -> u64 {
        self.status_changes
    }

    pub fn count_of(&self, label: &str) -> u64 {
        self.by_kind.get(label).copied().unwrap_or(0)
    }

    pub fn earliest_ms(&self) -> Option<u64> {
        self.earliest_ms
    }

    pub fn latest_ms(&self) -> Option<u64> {
        self.latest_ms
    }
}
