use crate::error::{SimError, SimResult};
use crate::global_variables::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Phase durations shared by both light policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightTiming {
    pub green_ms: u64,
    pub yellow_ms: u64,
    pub initial_red_ms: u64,
}

impl Default for LightTiming {
    fn default() -> Self {
        Self {
            green_ms: GREEN_DURATION_MS,
            yellow_ms: YELLOW_DURATION_MS,
            initial_red_ms: INITIAL_RED_DURATION_MS,
        }
    }
}

impl LightTiming {
    pub fn green(&self) -> Duration {
        Duration::from_millis(self.green_ms)
    }

    pub fn yellow(&self) -> Duration {
        Duration::from_millis(self.yellow_ms)
    }

    pub fn initial_red(&self) -> Duration {
        Duration::from_millis(self.initial_red_ms)
    }
}

/// Polling cadence of the demand-driven controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveTiming {
    pub idle_poll_ms: u64,
    pub green_poll_ms: u64,
    /// Upper bound on green polls; `green_poll_ms * max_green_polls` is the starvation cap.
    pub max_green_polls: u32,
    pub rest_ms: u64,
    pub north_south_offset_ms: u64,
}

impl Default for AdaptiveTiming {
    fn default() -> Self {
        Self {
            idle_poll_ms: ADAPTIVE_IDLE_POLL_MS,
            green_poll_ms: ADAPTIVE_GREEN_POLL_MS,
            max_green_polls: ADAPTIVE_MAX_GREEN_POLLS,
            rest_ms: ADAPTIVE_REST_MS,
            north_south_offset_ms: ADAPTIVE_NORTH_SOUTH_OFFSET_MS,
        }
    }
}

impl AdaptiveTiming {
    pub fn max_green(&self) -> Duration {
        Duration::from_millis(self.green_poll_ms * u64::from(self.max_green_polls))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleTiming {
    pub transit_ms: u64,
    pub admission_poll_ms: u64,
    pub box_clearance_ms: u64,
    pub collision_check_ms: u64,
}

impl Default for VehicleTiming {
    fn default() -> Self {
        Self {
            transit_ms: TRANSIT_DURATION_MS,
            admission_poll_ms: ADMISSION_POLL_MS,
            box_clearance_ms: BOX_CLEARANCE_MS,
            collision_check_ms: COLLISION_CHECK_MS,
        }
    }
}

impl VehicleTiming {
    pub fn transit(&self) -> Duration {
        Duration::from_millis(self.transit_ms)
    }

    pub fn admission_poll(&self) -> Duration {
        Duration::from_millis(self.admission_poll_ms)
    }

    /// Time a crossing vehicle keeps its intersection slot, never longer than the transit.
    pub fn box_clearance(&self) -> Duration {
        Duration::from_millis(self.box_clearance_ms.min(self.transit_ms))
    }

    pub fn collision_check(&self) -> Duration {
        Duration::from_millis(self.collision_check_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrivalConfig {
    pub fixed_min_ms: u64,
    pub fixed_max_ms: u64,
    pub per_direction_cap: usize,
    pub unsync_interval_ms: u64,
    pub unsync_per_tick: usize,
    pub adaptive_min_ms: u64,
    pub adaptive_max_ms: u64,
    pub base_probability: f64,
    pub red_probability: f64,
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self {
            fixed_min_ms: FIXED_ARRIVAL_MIN_MS,
            fixed_max_ms: FIXED_ARRIVAL_MAX_MS,
            per_direction_cap: MAX_VEHICLES_PER_DIRECTION,
            unsync_interval_ms: UNSYNC_ARRIVAL_INTERVAL_MS,
            unsync_per_tick: UNSYNC_VEHICLES_PER_TICK,
            adaptive_min_ms: ADAPTIVE_ARRIVAL_MIN_MS,
            adaptive_max_ms: ADAPTIVE_ARRIVAL_MAX_MS,
            base_probability: BASE_ARRIVAL_PROBABILITY,
            red_probability: RED_ARRIVAL_PROBABILITY,
        }
    }
}

/// Everything a run needs to know about timing and arrivals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub lights: LightTiming,
    pub adaptive: AdaptiveTiming,
    pub vehicles: VehicleTiming,
    pub arrivals: ArrivalConfig,
    /// Fixed seed for the arrival generators; random when absent.
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> SimResult<()> {
        let a = &self.arrivals;
        if a.fixed_min_ms >= a.fixed_max_ms {
            return Err(SimError::InvalidConfig(format!(
                "fixed arrival range [{}, {}) is empty",
                a.fixed_min_ms, a.fixed_max_ms
            )));
        }
        if a.adaptive_min_ms >= a.adaptive_max_ms {
            return Err(SimError::InvalidConfig(format!(
                "adaptive arrival range [{}, {}) is empty",
                a.adaptive_min_ms, a.adaptive_max_ms
            )));
        }
        for (name, p) in [("base_probability", a.base_probability), ("red_probability", a.red_probability)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::InvalidConfig(format!("{name} {p} is outside [0, 1]")));
            }
        }
        let polls = [
            ("vehicles.admission_poll_ms", self.vehicles.admission_poll_ms),
            ("vehicles.collision_check_ms", self.vehicles.collision_check_ms),
            ("adaptive.idle_poll_ms", self.adaptive.idle_poll_ms),
            ("adaptive.green_poll_ms", self.adaptive.green_poll_ms),
            ("arrivals.unsync_interval_ms", a.unsync_interval_ms),
        ];
        if let Some((name, _)) = polls.iter().find(|(_, ms)| *ms == 0) {
            return Err(SimError::InvalidConfig(format!("{name} must be non-zero")));
        }
        Ok(())
    }
}
