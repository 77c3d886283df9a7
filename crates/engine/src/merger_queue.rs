//! The Merger Queue (spec.md §4.5): a fixed-capacity FIFO of merger and
//! disruption events discovered during the GALAXY phase, drained in POST.

use sage_core::types::MergerType;
use sage_core::{GalaxyIndex, HaloIndex, SageError, SageResult, Snapshot};

/// One deferred merger or disruption event (spec.md §4.5).
#[derive(Debug, Clone, Copy)]
pub struct MergerEvent {
    pub satellite_idx: GalaxyIndex,
    pub central_idx: GalaxyIndex,
    pub remaining_merger_time: f64,
    pub time: f64,
    pub dt: f64,
    pub fof_root: HaloIndex,
    pub snapshot: Snapshot,
    pub step: usize,
    pub merger_type: MergerType,
}

/// Fixed-capacity FIFO, per-FOF-per-sub-step (spec.md §4.5). Never silently
/// drops: once at capacity, `queue_event` fails with `QueueFull`.
#[derive(Debug)]
pub struct MergerQueue {
    events: Vec<MergerEvent>,
    capacity: usize,
}

impl MergerQueue {
    pub fn new(capacity: usize) -> Self {
        MergerQueue { events: Vec::with_capacity(capacity), capacity }
    }

    /// Resets the queue to empty; called at sub-step boundaries.
    pub fn init(&mut self) {
        self.events.clear();
    }

    pub fn queue_event(&mut self, event: MergerEvent) -> SageResult<()> {
        if self.events.len() >= self.capacity {
            return Err(SageError::QueueFull {
                forest: sage_core::ForestId { file_nr: 0, forest_nr: 0 },
                fof_root: event.fof_root,
                capacity: self.capacity,
            });
        }
        self.events.push(event);
        Ok(())
    }

    /// Events in FIFO insertion order, as the POST drainer consumes them
    /// (spec.md P11).
    pub fn drain(&mut self) -> Vec<MergerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
