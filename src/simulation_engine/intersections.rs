use crate::communication::messages::SharedNotifier;
use crate::control_system::light_board::LightBoard;
use crate::global_variables::CROSSING_SLOTS;
use crate::simulation_engine::directions::{Direction, LightState};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A held place in the intersection box; dropping it frees the place.
pub type CrossingSlot = OwnedSemaphorePermit;

/// True when movements in `d1` and `d2` can hit each other.
///
/// Opposite directions and directions on the same axis use separate lanes
/// and never collide; perpendicular axes always can.
pub fn directions_can_collide(d1: Direction, d2: Direction) -> bool {
    if d1.opposite() == d2 {
        return false;
    }
    d1.axis() != d2.axis()
}

/// The single four-way intersection: its lights and its crossing slots.
pub struct Intersection {
    lights: Arc<LightBoard>,
    crossing_slots: Arc<Semaphore>,
}

impl Intersection {
    pub fn new(lights: Arc<LightBoard>) -> Self {
        Self {
            lights,
            crossing_slots: Arc::new(Semaphore::new(CROSSING_SLOTS)),
        }
    }

    /// An intersection with no lights installed; `can_pass` is always false.
    pub fn without_lights(notifier: SharedNotifier) -> Self {
        Self::new(Arc::new(LightBoard::empty(notifier)))
    }

    pub fn lights(&self) -> &Arc<LightBoard> {
        &self.lights
    }

    /// Whether `direction` may enter now: its axis leader's light must be GREEN.
    ///
    /// A direction with no governing light cannot pass.
    pub fn can_pass(&self, direction: Direction) -> bool {
        self.lights.state(direction.axis().leader()) == Some(LightState::Green)
    }

    pub fn directions_can_collide(&self, d1: Direction, d2: Direction) -> bool {
        directions_can_collide(d1, d2)
    }

    /// Waits for a free place in the box. `None` only if the slots were closed.
    pub async fn enter(&self) -> Option<CrossingSlot> {
        Arc::clone(&self.crossing_slots).acquire_owned().await.ok()
    }

    pub fn free_slots(&self) -> usize {
        self.crossing_slots.available_permits()
    }
}
