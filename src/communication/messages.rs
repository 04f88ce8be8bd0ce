use crate::error::SimResult;
use crate::shared_data::{EventKind, TrafficEvent};
use crate::simulation_engine::directions::{Direction, LightState};
use crate::simulation_engine::vehicles::{Vehicle, VehicleId};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Presentation-side callbacks fired by the simulation core.
///
/// Calls arrive from any task and must return quickly; an implementation
/// that renders marshals the data to its own thread. No core lock is held
/// during a call, so an implementation may read lights, counters or vehicles
/// back. Every method defaults to a no-op so implementors only override what
/// they display.
pub trait Notifier: Send + Sync {
    fn light_state(&self, _direction: Direction, _state: LightState) {}

    fn waiting_count(&self, _direction: Direction, _count: u32) {}

    fn passing_count(&self, _direction: Direction, _count: u32) {}

    fn vehicle_spawned(&self, _vehicle: &Vehicle) {}

    fn vehicle_advanced(&self, _vehicle: &Vehicle) {}

    fn vehicle_removed(&self, _vehicle: &Vehicle) {}

    fn collision(&self, _first: VehicleId, _second: VehicleId) {}

    fn log(&self, _message: &str) {}
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Discards everything.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {}

/// Writes every callback to the `log` facade.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn light_state(&self, direction: Direction, state: LightState) {
        log::info!("Light {} -> {}", direction, state);
    }

    fn waiting_count(&self, direction: Direction, count: u32) {
        log::debug!("Waiting on {}: {}", direction, count);
    }

    fn passing_count(&self, direction: Direction, count: u32) {
        log::debug!("Passing on {}: {}", direction, count);
    }

    fn vehicle_spawned(&self, vehicle: &Vehicle) {
        log::debug!("Vehicle {} spawned heading {}", vehicle.id, vehicle.direction);
    }

    fn vehicle_advanced(&self, vehicle: &Vehicle) {
        log::debug!("Vehicle {} {:?} on {}", vehicle.id, vehicle.state, vehicle.direction);
    }

    fn vehicle_removed(&self, vehicle: &Vehicle) {
        log::debug!("Vehicle {} removed from {}", vehicle.id, vehicle.direction);
    }

    fn collision(&self, first: VehicleId, second: VehicleId) {
        log::warn!("Collision between vehicles {} and {}", first, second);
    }

    fn log(&self, message: &str) {
        log::info!("{}", message);
    }
}

/// Keeps a timestamped trace of every callback, for tests and CSV export.
pub struct TraceRecorder {
    started: Instant,
    events: Mutex<Vec<TrafficEvent>>,
    echo: bool,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            events: Mutex::new(Vec::new()),
            echo: false,
        }
    }

    /// Also forwards log lines to the `log` facade.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn push(&self, event: TrafficEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    pub fn events(&self) -> Vec<TrafficEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn events_of(&self, kind: EventKind) -> Vec<TrafficEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }

    /// Writes the trace as CSV with a header row.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> SimResult<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        for event in self.events() {
            writer.serialize(event)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TraceRecorder {
    fn light_state(&self, direction: Direction, state: LightState) {
        self.push(TrafficEvent::light(self.elapsed_ms(), direction, state));
    }

    fn waiting_count(&self, direction: Direction, count: u32) {
        self.push(TrafficEvent::counter(
            self.elapsed_ms(),
            EventKind::WaitingCount,
            direction,
            count,
        ));
    }

    fn passing_count(&self, direction: Direction, count: u32) {
        self.push(TrafficEvent::counter(
            self.elapsed_ms(),
            EventKind::PassingCount,
            direction,
            count,
        ));
    }

    fn vehicle_spawned(&self, vehicle: &Vehicle) {
        self.push(TrafficEvent::vehicle(
            self.elapsed_ms(),
            EventKind::VehicleSpawned,
            vehicle.id,
            vehicle.direction,
            vehicle.state,
        ));
    }

    fn vehicle_advanced(&self, vehicle: &Vehicle) {
        self.push(TrafficEvent::vehicle(
            self.elapsed_ms(),
            EventKind::VehicleAdvanced,
            vehicle.id,
            vehicle.direction,
            vehicle.state,
        ));
    }

    fn vehicle_removed(&self, vehicle: &Vehicle) {
        self.push(TrafficEvent::vehicle(
            self.elapsed_ms(),
            EventKind::VehicleRemoved,
            vehicle.id,
            vehicle.direction,
            vehicle.state,
        ));
    }

    fn collision(&self, first: VehicleId, second: VehicleId) {
        self.push(TrafficEvent::collision(self.elapsed_ms(), first, second));
    }

    fn log(&self, message: &str) {
        if self.echo {
            log::info!("{}", message);
        }
        self.push(TrafficEvent::log(self.elapsed_ms(), message));
    }
}
