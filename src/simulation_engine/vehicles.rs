use crate::global_variables::{LANE_LENGTH, QUEUE_SPACING, VEHICLE_SIZE};
use crate::simulation_engine::directions::Direction;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

pub type VehicleId = u64;

/// Where a vehicle is in its life at the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleState {
    Queued,
    Crossing,
    Departed,
}

/// Axis-aligned box a vehicle occupies on the intersection plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn square(x: f64, y: f64, size: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + size,
            max_y: y + size,
        }
    }

    /// Strict overlap; boxes that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

/// Represents a vehicle approaching or crossing the intersection.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub direction: Direction,
    pub state: VehicleState,
    /// Position in its direction's queue at spawn time, used for the stand-off offset.
    pub queue_slot: usize,
    /// Set on the QUEUED -> CROSSING transition.
    pub crossing_since: Option<Instant>,
}

impl Vehicle {
    pub fn new(id: VehicleId, direction: Direction, queue_slot: usize) -> Self {
        Self {
            id,
            direction,
            state: VehicleState::Queued,
            queue_slot,
            crossing_since: None,
        }
    }

    /// Fraction of the approach lane covered, in [0, 1]. Queued vehicles have not moved.
    pub fn progress(&self, now: Instant, transit: Duration) -> f64 {
        match (self.state, self.crossing_since) {
            (VehicleState::Departed, _) => 1.0,
            (VehicleState::Crossing, Some(since)) => {
                if transit.is_zero() {
                    return 1.0;
                }
                let elapsed = now.saturating_duration_since(since).as_secs_f64();
                (elapsed / transit.as_secs_f64()).min(1.0)
            }
            _ => 0.0,
        }
    }

    /// The box this vehicle covers after travelling `progress` of its lane.
    pub fn extent_at(&self, progress: f64) -> Extent {
        let offset = self.queue_slot as f64 * QUEUE_SPACING;
        let travelled = progress.clamp(0.0, 1.0) * LANE_LENGTH;
        let (x, y) = match self.direction {
            Direction::NorthSouth => (250.0, -30.0 - offset + travelled),
            Direction::SouthNorth => (220.0, 530.0 + offset - travelled),
            Direction::EastWest => (530.0 + offset - travelled, 250.0),
            Direction::WestEast => (-30.0 - offset + travelled, 220.0),
        };
        Extent::square(x, y, VEHICLE_SIZE)
    }

    pub fn extent(&self, now: Instant, transit: Duration) -> Extent {
        self.extent_at(self.progress(now, transit))
    }
}
