// simulation.rs
//
// Run control: wires one intersection, its light controller, the vehicle
// manager and an arrival generator together for a single run mode, and
// tears them down again on stop.

use crate::communication::messages::SharedNotifier;
use crate::config::SimulationConfig;
use crate::control_system::demand_counters::DemandCounters;
use crate::control_system::light_board::LightBoard;
use crate::control_system::traffic_light_controller::{ControlPolicy, TrafficLightController};
use crate::error::{SimError, SimResult};
use crate::shared_data::RunSummary;
use crate::simulation_engine::generators;
use crate::simulation_engine::intersections::Intersection;
use crate::simulation_engine::run_signal::RunSignal;
use crate::simulation_engine::vehicle_manager::{CrossingMode, VehicleManager};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Fixed 8 s GREEN / 2 s YELLOW lights, axes alternating.
    FixedCycle,
    /// No lights at all; vehicles cross on arrival until they collide.
    Unsynchronized,
    /// Lights go GREEN only for an axis with waiting vehicles.
    Adaptive,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::FixedCycle => "fixed",
            RunMode::Unsynchronized => "unsync",
            RunMode::Adaptive => "adaptive",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RunMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" | "fixed-cycle" => Ok(RunMode::FixedCycle),
            "unsync" | "unsynchronized" => Ok(RunMode::Unsynchronized),
            "adaptive" | "smart" => Ok(RunMode::Adaptive),
            other => Err(SimError::InvalidConfig(format!("unknown run mode '{other}'"))),
        }
    }
}

/// Everything belonging to one started run.
struct ActiveRun {
    mode: RunMode,
    signal: RunSignal,
    intersection: Arc<Intersection>,
    controller: Arc<TrafficLightController>,
    vehicles: Arc<VehicleManager>,
    handles: Vec<JoinHandle<()>>,
}

/// Starts and stops runs. Every `start` builds a fresh intersection and
/// vehicle manager, so a collision never carries over into the next run.
pub struct Simulation {
    config: SimulationConfig,
    notifier: SharedNotifier,
    active: Option<ActiveRun>,
    last_summary: Option<RunSummary>,
}

impl Simulation {
    pub fn new(config: SimulationConfig, notifier: SharedNotifier) -> Self {
        Self {
            config,
            notifier,
            active: None,
            last_summary: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Spawns the controller loops, the arrival generator and, in
    /// unsynchronized mode, the collision watch on the current tokio runtime.
    pub fn start(&mut self, mode: RunMode) -> SimResult<()> {
        if self.active.is_some() {
            return Err(SimError::AlreadyRunning);
        }
        Handle::try_current().map_err(|_| SimError::NoRuntime)?;
        self.config.validate()?;

        let signal = RunSignal::new();
        let notifier = Arc::clone(&self.notifier);
        let (board, policy, counters, crossing) = match mode {
            RunMode::FixedCycle => (
                LightBoard::full(Arc::clone(&notifier)),
                ControlPolicy::FixedCycle,
                None,
                CrossingMode::LightControlled,
            ),
            RunMode::Adaptive => {
                let counters = Arc::new(DemandCounters::new(Arc::clone(&notifier)));
                (
                    LightBoard::full(Arc::clone(&notifier)),
                    ControlPolicy::Adaptive(Arc::clone(&counters)),
                    Some(counters),
                    CrossingMode::LightControlled,
                )
            }
            RunMode::Unsynchronized => (
                LightBoard::empty(Arc::clone(&notifier)),
                ControlPolicy::FixedCycle,
                None,
                CrossingMode::Unsynchronized,
            ),
        };

        let board = Arc::new(board);
        let intersection = Arc::new(Intersection::new(Arc::clone(&board)));
        let controller = Arc::new(TrafficLightController::new(
            board,
            policy,
            &self.config,
            signal.clone(),
            Arc::clone(&notifier),
        ));
        let vehicles = Arc::new(VehicleManager::new(
            Arc::clone(&intersection),
            crossing,
            counters,
            self.config.vehicles.clone(),
            signal.clone(),
            Arc::clone(&notifier),
        ));

        let mut handles = controller.spawn_leaders();
        let arrivals = self.config.arrivals.clone();
        let seed = self.config.seed;
        let generator = match mode {
            RunMode::FixedCycle => tokio::spawn(generators::run_fixed_arrivals(
                Arc::clone(&vehicles),
                arrivals,
                seed,
                signal.clone(),
            )),
            RunMode::Unsynchronized => {
                handles.push(vehicles.spawn_collision_watch());
                tokio::spawn(generators::run_unsynchronized_arrivals(
                    Arc::clone(&vehicles),
                    arrivals,
                    seed,
                    signal.clone(),
                ))
            }
            RunMode::Adaptive => tokio::spawn(generators::run_adaptive_arrivals(
                Arc::clone(&vehicles),
                arrivals,
                seed,
                signal.clone(),
            )),
        };
        handles.push(generator);

        log::info!("Simulation started in {} mode", mode);
        self.notifier.log(&format!("Simulation started ({})", mode));
        self.active = Some(ActiveRun {
            mode,
            signal,
            intersection,
            controller,
            vehicles,
            handles,
        });
        Ok(())
    }

    /// Signals every loop to stop and waits for the controllers and the
    /// generator to exit. Vehicle tasks notice the signal on their own.
    pub async fn stop(&mut self) -> SimResult<RunSummary> {
        let run = self.active.take().ok_or(SimError::NotRunning)?;
        run.signal.stop();
        for handle in run.handles {
            if let Err(e) = handle.await {
                log::error!("simulation task ended abnormally: {}", e);
            }
        }
        let summary = run.vehicles.summary();
        log::info!("Simulation stopped ({}): {:?}", run.mode, summary);
        self.notifier.log(&format!("Simulation stopped ({})", run.mode));
        self.last_summary = Some(summary.clone());
        Ok(summary)
    }

    pub fn intersection(&self) -> Option<&Arc<Intersection>> {
        self.active.as_ref().map(|run| &run.intersection)
    }

    pub fn controller(&self) -> Option<&Arc<TrafficLightController>> {
        self.active.as_ref().map(|run| &run.controller)
    }

    pub fn vehicles(&self) -> Option<&Arc<VehicleManager>> {
        self.active.as_ref().map(|run| &run.vehicles)
    }

    pub fn is_collision_detected(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| run.vehicles.is_collision_detected())
    }

    /// Counts of the current run, or of the last one once it has stopped.
    pub fn summary(&self) -> RunSummary {
        match &self.active {
            Some(run) => run.vehicles.summary(),
            None => self.last_summary.clone().unwrap_or_default(),
        }
    }
}

impl Drop for Simulation {
    /// A run dropped without `stop` still winds down its loops.
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            run.signal.stop();
        }
    }
}
