use crate::communication::messages::SharedNotifier;
use crate::simulation_engine::directions::{Axis, Direction, LightState};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// The published state of every installed light.
///
/// A phase change rewrites several lights under one lock, so readers never
/// observe a half-applied transition. Notifications go out after the lock is
/// released, so a notifier may read the board back.
pub struct LightBoard {
    lights: Mutex<HashMap<Direction, LightState>>,
    notifier: SharedNotifier,
}

impl LightBoard {
    /// Installs one RED light per direction given.
    pub fn new(directions: &[Direction], notifier: SharedNotifier) -> Self {
        let lights = directions
            .iter()
            .map(|&direction| (direction, LightState::Red))
            .collect();
        Self {
            lights: Mutex::new(lights),
            notifier,
        }
    }

    /// A board with all four lights installed.
    pub fn full(notifier: SharedNotifier) -> Self {
        Self::new(&Direction::ALL, notifier)
    }

    /// A board without lights, for runs where nothing arbitrates access.
    pub fn empty(notifier: SharedNotifier) -> Self {
        Self::new(&[], notifier)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Direction, LightState>> {
        self.lights.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn has_light(&self, direction: Direction) -> bool {
        self.lock().contains_key(&direction)
    }

    pub fn state(&self, direction: Direction) -> Option<LightState> {
        self.lock().get(&direction).copied()
    }

    /// Applies every change in one step, then notifies each light that actually changed.
    ///
    /// Directions without an installed light are skipped. Returns false if
    /// the result leaves both axes GREEN.
    pub fn publish(&self, changes: &[(Direction, LightState)]) -> bool {
        let (changed, conflict) = {
            let mut lights = self.lock();
            let mut changed = Vec::with_capacity(changes.len());
            for &(direction, state) in changes {
                if let Some(current) = lights.get_mut(&direction) {
                    if *current != state {
                        *current = state;
                        changed.push((direction, state));
                    }
                }
            }
            (changed, conflicting_greens(&lights))
        };

        for (direction, state) in changed {
            self.notifier.light_state(direction, state);
        }
        if conflict {
            log::error!("Perpendicular axes are green at the same time: {:?}", changes);
        }
        !conflict
    }

    /// GREEN for both directions of `axis`, RED for the other axis.
    pub fn publish_green(&self, axis: Axis) -> bool {
        let [a, b] = axis.directions();
        let [c, d] = axis.perpendicular().directions();
        // Red is notified first so observers never see two green axes.
        self.publish(&[
            (c, LightState::Red),
            (d, LightState::Red),
            (a, LightState::Green),
            (b, LightState::Green),
        ])
    }

    pub fn publish_axis(&self, axis: Axis, state: LightState) -> bool {
        let [a, b] = axis.directions();
        self.publish(&[(a, state), (b, state)])
    }

    pub fn publish_all_red(&self) -> bool {
        let changes: Vec<_> = Direction::ALL
            .iter()
            .map(|&direction| (direction, LightState::Red))
            .collect();
        self.publish(&changes)
    }

    /// True if a light on each axis is GREEN right now.
    pub fn perpendicular_green(&self) -> bool {
        conflicting_greens(&self.lock())
    }
}

fn conflicting_greens(lights: &HashMap<Direction, LightState>) -> bool {
    let green_on = |axis: Axis| {
        axis.directions()
            .iter()
            .any(|d| lights.get(d) == Some(&LightState::Green))
    };
    green_on(Axis::Vertical) && green_on(Axis::Horizontal)
}
