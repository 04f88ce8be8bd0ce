// generators.rs
//
// Arrival processes, one per run mode. Each generator is a single task that
// sleeps between arrivals, spawns vehicles through the VehicleManager and
// hands every new vehicle its own crossing task.

use crate::config::ArrivalConfig;
use crate::simulation_engine::directions::{Direction, LightState};
use crate::simulation_engine::run_signal::RunSignal;
use crate::simulation_engine::vehicle_manager::VehicleManager;
use crate::simulation_engine::vehicles::Vehicle;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// Seeded generator when a seed is configured, otherwise seeded from the thread rng.
pub fn arrival_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_rng(&mut rand::rng()),
    }
}

/// Whether one more vehicle fits in a direction that already has `in_flight`.
pub fn below_cap(in_flight: usize, cap: usize) -> bool {
    in_flight < cap
}

/// Spawns a vehicle unless the direction is already at its cap.
pub fn try_spawn_capped(manager: &VehicleManager, direction: Direction, cap: usize) -> Option<Vehicle> {
    if !below_cap(manager.in_flight(direction), cap) {
        log::debug!("{} is full ({} vehicles), skipping arrival", direction, cap);
        return None;
    }
    Some(manager.spawn(direction))
}

/// Arrival chance for a direction given its light; RED lights attract more traffic.
pub fn arrival_probability(config: &ArrivalConfig, light: Option<LightState>) -> f64 {
    match light {
        Some(LightState::Red) => config.red_probability,
        _ => config.base_probability,
    }
}

fn random_pause(rng: &mut SmallRng, min_ms: u64, max_ms: u64) -> Duration {
    Duration::from_millis(rng.random_range(min_ms..max_ms))
}

/// One vehicle every 500-2000 ms in a random direction, at most `per_direction_cap` in flight each.
pub async fn run_fixed_arrivals(
    manager: Arc<VehicleManager>,
    config: ArrivalConfig,
    seed: Option<u64>,
    signal: RunSignal,
) {
    let mut rng = arrival_rng(seed);
    loop {
        let pause = random_pause(&mut rng, config.fixed_min_ms, config.fixed_max_ms);
        if !signal.sleep(pause).await {
            break;
        }
        let direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
        if let Some(vehicle) = try_spawn_capped(&manager, direction, config.per_direction_cap) {
            manager.admit_and_cross(&vehicle);
        }
    }
    log::debug!("fixed arrivals stopped");
}

/// A burst of vehicles on a fixed interval, until the first collision.
pub async fn run_unsynchronized_arrivals(
    manager: Arc<VehicleManager>,
    config: ArrivalConfig,
    seed: Option<u64>,
    signal: RunSignal,
) {
    let mut rng = arrival_rng(seed);
    let interval = Duration::from_millis(config.unsync_interval_ms);
    while !manager.is_collision_detected() {
        for _ in 0..config.unsync_per_tick {
            if !signal.is_running() || manager.is_collision_detected() {
                break;
            }
            let direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
            let vehicle = manager.spawn(direction);
            manager.admit_and_cross(&vehicle);
        }
        if !signal.sleep(interval).await {
            break;
        }
    }
    log::debug!("unsynchronized arrivals stopped");
}

/// Every 1000-3000 ms each direction independently rolls for an arrival.
pub async fn run_adaptive_arrivals(
    manager: Arc<VehicleManager>,
    config: ArrivalConfig,
    seed: Option<u64>,
    signal: RunSignal,
) {
    let mut rng = arrival_rng(seed);
    loop {
        let pause = random_pause(&mut rng, config.adaptive_min_ms, config.adaptive_max_ms);
        if !signal.sleep(pause).await {
            break;
        }
        for direction in Direction::ALL {
            let light = manager.intersection().lights().state(direction);
            if rng.random_bool(arrival_probability(&config, light)) {
                let vehicle = manager.spawn(direction);
                manager.admit_and_cross(&vehicle);
            }
        }
    }
    log::debug!("adaptive arrivals stopped");
}
