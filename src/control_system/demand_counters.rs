use crate::communication::messages::SharedNotifier;
use crate::simulation_engine::directions::{Axis, Direction};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionDemand {
    pub waiting: u32,
    pub passing: u32,
}

/// A lifecycle step that moves the demand counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandEvent {
    /// A vehicle joined the queue.
    Queued,
    /// A queued vehicle started crossing.
    Admitted,
    /// A crossing vehicle left the intersection.
    Departed,
    /// A queued vehicle was withdrawn before crossing.
    Withdrawn,
}

/// An applied counter update whose notifications have not gone out yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "pass the change to DemandCounters::announce"]
pub struct DemandChange {
    pub direction: Direction,
    pub before: DirectionDemand,
    pub after: DirectionDemand,
}

/// Live waiting/passing counts per direction, read by the adaptive controller.
///
/// Each update is a single read-modify-write under the lock. Decrementing a
/// zero counter is ignored. Notifications are sent with no lock held.
pub struct DemandCounters {
    counts: Mutex<[DirectionDemand; 4]>,
    notifier: SharedNotifier,
}

impl DemandCounters {
    pub fn new(notifier: SharedNotifier) -> Self {
        Self {
            counts: Mutex::new([DirectionDemand::default(); 4]),
            notifier,
        }
    }

    /// Applies `event` without notifying; the caller announces the change
    /// once it has released its own locks.
    pub fn record(&self, direction: Direction, event: DemandEvent) -> DemandChange {
        let mut counts = self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = &mut counts[direction.index()];
        let before = *entry;
        match event {
            DemandEvent::Queued => entry.waiting += 1,
            DemandEvent::Admitted => {
                if entry.waiting > 0 {
                    entry.waiting -= 1;
                }
                entry.passing += 1;
            }
            DemandEvent::Departed => entry.passing = entry.passing.saturating_sub(1),
            DemandEvent::Withdrawn => entry.waiting = entry.waiting.saturating_sub(1),
        }
        DemandChange {
            direction,
            before,
            after: *entry,
        }
    }

    /// Notifies the counters that `change` actually moved.
    pub fn announce(&self, change: DemandChange) {
        if change.before.waiting != change.after.waiting {
            self.notifier.waiting_count(change.direction, change.after.waiting);
        }
        if change.before.passing != change.after.passing {
            self.notifier.passing_count(change.direction, change.after.passing);
        }
    }

    fn update(&self, direction: Direction, event: DemandEvent) {
        let change = self.record(direction, event);
        self.announce(change);
    }

    pub fn vehicle_queued(&self, direction: Direction) {
        self.update(direction, DemandEvent::Queued);
    }

    pub fn vehicle_admitted(&self, direction: Direction) {
        self.update(direction, DemandEvent::Admitted);
    }

    pub fn vehicle_departed(&self, direction: Direction) {
        self.update(direction, DemandEvent::Departed);
    }

    pub fn vehicle_withdrawn(&self, direction: Direction) {
        self.update(direction, DemandEvent::Withdrawn);
    }

    pub fn demand(&self, direction: Direction) -> DirectionDemand {
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())[direction.index()]
    }

    /// Summed demand of both directions on the axis.
    pub fn axis_demand(&self, axis: Axis) -> DirectionDemand {
        let counts = self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        axis.directions()
            .iter()
            .fold(DirectionDemand::default(), |acc, d| {
                let c = counts[d.index()];
                DirectionDemand {
                    waiting: acc.waiting + c.waiting,
                    passing: acc.passing + c.passing,
                }
            })
    }

    pub fn has_waiting(&self, axis: Axis) -> bool {
        self.axis_demand(axis).waiting > 0
    }

    /// True once nobody on the axis is waiting or crossing.
    pub fn axis_clear(&self, axis: Axis) -> bool {
        let demand = self.axis_demand(axis);
        demand.waiting == 0 && demand.passing == 0
    }
}
