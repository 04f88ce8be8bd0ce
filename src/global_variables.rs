// Light phase durations (milliseconds)
pub const GREEN_DURATION_MS: u64 = 8000;
pub const YELLOW_DURATION_MS: u64 = 2000;
pub const INITIAL_RED_DURATION_MS: u64 = 3000;

// Adaptive controller polling
pub const ADAPTIVE_IDLE_POLL_MS: u64 = 1000;
pub const ADAPTIVE_GREEN_POLL_MS: u64 = 100;
pub const ADAPTIVE_MAX_GREEN_POLLS: u32 = 80;
pub const ADAPTIVE_REST_MS: u64 = 1000;
pub const ADAPTIVE_NORTH_SOUTH_OFFSET_MS: u64 = 1000;

// Vehicle lifecycle
pub const TRANSIT_DURATION_MS: u64 = 5000;
pub const ADMISSION_POLL_MS: u64 = 500;
pub const BOX_CLEARANCE_MS: u64 = 1000;
pub const COLLISION_CHECK_MS: u64 = 100;

// Intersection admission
pub const AXIS_PERMITS: usize = 1;
pub const CROSSING_SLOTS: usize = 2;

// Arrival processes
pub const FIXED_ARRIVAL_MIN_MS: u64 = 500;
pub const FIXED_ARRIVAL_MAX_MS: u64 = 2000;
pub const MAX_VEHICLES_PER_DIRECTION: usize = 5;
pub const UNSYNC_ARRIVAL_INTERVAL_MS: u64 = 500;
pub const UNSYNC_VEHICLES_PER_TICK: usize = 2;
pub const ADAPTIVE_ARRIVAL_MIN_MS: u64 = 1000;
pub const ADAPTIVE_ARRIVAL_MAX_MS: u64 = 3000;
pub const BASE_ARRIVAL_PROBABILITY: f64 = 0.3;
pub const RED_ARRIVAL_PROBABILITY: f64 = 0.45;

// Approach geometry (abstract units)
pub const LANE_LENGTH: f64 = 500.0;
pub const VEHICLE_SIZE: f64 = 20.0;
pub const QUEUE_SPACING: f64 = 40.0;
