// src/shared_data.rs

use crate::simulation_engine::directions::{Direction, LightState};
use crate::simulation_engine::vehicles::{VehicleId, VehicleState};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    LightChanged,
    WaitingCount,
    PassingCount,
    VehicleSpawned,
    VehicleAdvanced,
    VehicleRemoved,
    Collision,
    Log,
}

/// One line of the run trace. Flat so it serialises straight to a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficEvent {
    /// Milliseconds since the recorder was created.
    pub elapsed_ms: u64,
    pub kind: EventKind,
    pub direction: Option<Direction>,
    pub light: Option<LightState>,
    pub count: Option<u32>,
    pub vehicle_id: Option<VehicleId>,
    pub vehicle_state: Option<VehicleState>,
    pub other_vehicle_id: Option<VehicleId>,
    pub message: Option<String>,
}

impl TrafficEvent {
    fn bare(elapsed_ms: u64, kind: EventKind) -> Self {
        Self {
            elapsed_ms,
            kind,
            direction: None,
            light: None,
            count: None,
            vehicle_id: None,
            vehicle_state: None,
            other_vehicle_id: None,
            message: None,
        }
    }

    pub fn light(elapsed_ms: u64, direction: Direction, state: LightState) -> Self {
        Self {
            direction: Some(direction),
            light: Some(state),
            ..Self::bare(elapsed_ms, EventKind::LightChanged)
        }
    }

    pub fn counter(elapsed_ms: u64, kind: EventKind, direction: Direction, count: u32) -> Self {
        Self {
            direction: Some(direction),
            count: Some(count),
            ..Self::bare(elapsed_ms, kind)
        }
    }

    pub fn vehicle(
        elapsed_ms: u64,
        kind: EventKind,
        id: VehicleId,
        direction: Direction,
        state: VehicleState,
    ) -> Self {
        Self {
            direction: Some(direction),
            vehicle_id: Some(id),
            vehicle_state: Some(state),
            ..Self::bare(elapsed_ms, kind)
        }
    }

    pub fn collision(elapsed_ms: u64, first: VehicleId, second: VehicleId) -> Self {
        Self {
            vehicle_id: Some(first),
            other_vehicle_id: Some(second),
            ..Self::bare(elapsed_ms, EventKind::Collision)
        }
    }

    pub fn log(elapsed_ms: u64, message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::bare(elapsed_ms, EventKind::Log)
        }
    }
}

/// End-of-run counts reported by the run controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub spawned: u64,
    pub departed: u64,
    pub removed: u64,
    pub active: usize,
    pub collision_detected: bool,
}
