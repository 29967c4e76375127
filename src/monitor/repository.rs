use super::measurement::{Measurement, Pruned};
use crate::topology::ResourceId;
use log::debug;
use parking_lot::Mutex;

pub const DEFAULT_REPOSITORY_CAPACITY: usize = 10_000;

/// Bounded buffer of measurements for one monitored resource.
///
/// Producers call [`AgentRepository::add`]; a collector periodically calls
/// [`AgentRepository::drain_and_reset`]. Once full, the oldest measurement is
/// evicted on every add and folded into a [`Pruned`] aggregate that is
/// reported ahead of the live measurements on the next drain.
#[derive(Debug)]
pub struct AgentRepository {
    resource: Option<ResourceId>,
    capacity: usize,
    state: Mutex<RepositoryState>,
}

#[derive(Debug)]
struct RepositoryState {
    ring: Ring,
    status_changes: usize,
    pruned: Pruned,
}

impl RepositoryState {
    fn empty(capacity: usize) -> Self {
        Self {
            ring: Ring::new(capacity),
            status_changes: 0,
            pruned: Pruned::default(),
        }
    }
}

/// Fixed-capacity ring; `head` indexes the oldest slot once the ring wraps.
#[derive(Debug)]
struct Ring {
    slots: Vec<Measurement>,
    head: usize,
    capacity: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            head: 0,
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    /// Appends at the tail and returns the evicted head when full.
    fn push(&mut self, measurement: Measurement) -> Option<Measurement> {
        if self.slots.len() < self.capacity {
            self.slots.push(measurement);
            return None;
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], measurement);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    fn into_ordered(self) -> Vec<Measurement> {
        let mut slots = self.slots;
        slots.rotate_left(self.head);
        slots
    }
}

/// Contents detached from a repository by a drain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub status_changes: usize,
    pub pruned: Option<Pruned>,
    pub measurements: Vec<Measurement>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotEntry<'a> {
    Pruned(&'a Pruned),
    Measurement(&'a Measurement),
}

impl Snapshot {
    /// Entries in chronological order, the pruned aggregate first.
    pub fn entries(&self) -> impl Iterator<Item = SnapshotEntry<'_>> {
        self.pruned
            .iter()
            .map(SnapshotEntry::Pruned)
            .chain(self.measurements.iter().map(SnapshotEntry::Measurement))
    }

    pub fn len(&self) -> usize {
        self.measurements.len() + usize::from(self.pruned.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AgentRepository {
    pub fn new(resource: ResourceId, capacity: usize) -> Self {
        Self::build(Some(resource), capacity)
    }

    pub fn with_default_capacity(resource: ResourceId) -> Self {
        Self::new(resource, DEFAULT_REPOSITORY_CAPACITY)
    }

    /// A repository not tied to a registered resource.
    pub fn detached(capacity: usize) -> Self {
        Self::build(None, capacity)
    }

    fn build(resource: Option<ResourceId>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            resource,
            capacity,
            state: Mutex::new(RepositoryState::empty(capacity)),
        }
    }

    pub fn resource(&self) -> Option<ResourceId> {
        self.resource
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn add(&self, measurement: Measurement) {
        let mut state = self.state.lock();
        if measurement.is_status_change() {
            state.status_changes += 1;
        }
        if let Some(evicted) = state.ring.push(measurement) {
            if evicted.is_status_change() {
                state.status_changes -= 1;
            }
            state.pruned.record(&evicted);
        }
    }

    /// Detaches everything buffered so far and leaves the repository empty.
    /// Safe to call from an out-of-band collector while the regular poller
    /// and producers are active.
    pub fn drain_and_reset(&self) -> Snapshot {
        let drained = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, RepositoryState::empty(self.capacity))
        };
        let pruned = drained.pruned.exists().then_some(drained.pruned);
        if let Some(pruned) = &pruned {
            debug!(
                "event=monitor_repository_pruned resource={} pruned={} status_changes={}",
                self.resource_label(),
                pruned.count(),
                pruned.status_changes()
            );
        }
        Snapshot {
            status_changes: drained.status_changes,
            pruned,
            measurements: drained.ring.into_ordered(),
        }
    }

    /// Live measurements only; pruned entries are not counted. Used to report
    /// backlog, never to make correctness decisions.
    pub fn size(&self) -> usize {
        self.state.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn resource_label(&self) -> String {
        self.resource
            .map(|resource| resource.to_string())
            .unwrap_or_else(|| "detached".into())
    }
}
