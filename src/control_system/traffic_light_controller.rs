use crate::communication::messages::SharedNotifier;
use crate::config::{AdaptiveTiming, LightTiming, SimulationConfig};
use crate::control_system::demand_counters::DemandCounters;
use crate::control_system::light_board::LightBoard;
use crate::global_variables::AXIS_PERMITS;
use crate::simulation_engine::directions::{Axis, Direction, LightState};
use crate::simulation_engine::run_signal::RunSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// How an axis leader decides when to go green and for how long.
#[derive(Clone)]
pub enum ControlPolicy {
    /// Fixed GREEN/YELLOW durations, axes strictly alternating.
    FixedCycle,
    /// GREEN only while the axis has demand, capped by the starvation guard.
    Adaptive(Arc<DemandCounters>),
}

/// Drives the RED -> GREEN -> YELLOW -> RED cycle of one intersection.
///
/// Only axis leaders run a loop; the paired direction is published together
/// with its leader. The single axis permit is what keeps perpendicular axes
/// from being green at the same time.
pub struct TrafficLightController {
    board: Arc<LightBoard>,
    axis_permit: Arc<Semaphore>,
    policy: ControlPolicy,
    timing: LightTiming,
    adaptive: AdaptiveTiming,
    signal: RunSignal,
    notifier: SharedNotifier,
}

impl TrafficLightController {
    pub fn new(
        board: Arc<LightBoard>,
        policy: ControlPolicy,
        config: &SimulationConfig,
        signal: RunSignal,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            board,
            axis_permit: Arc::new(Semaphore::new(AXIS_PERMITS)),
            policy,
            timing: config.lights.clone(),
            adaptive: config.adaptive.clone(),
            signal,
            notifier,
        }
    }

    /// Permits currently free on the axis semaphore (1 when no axis is green).
    pub fn free_axis_permits(&self) -> usize {
        self.axis_permit.available_permits()
    }

    /// Current state of a direction's light; a missing light reads as RED.
    pub fn current_state(&self, direction: Direction) -> LightState {
        self.board.state(direction).unwrap_or(LightState::Red)
    }

    /// Starts one loop per axis whose leader light is installed.
    pub fn spawn_leaders(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        Axis::BOTH
            .into_iter()
            .filter(|axis| self.board.has_light(axis.leader()))
            .map(|axis| tokio::spawn(Arc::clone(self).run_axis(axis)))
            .collect()
    }

    pub async fn run_axis(self: Arc<Self>, axis: Axis) {
        match self.policy.clone() {
            ControlPolicy::FixedCycle => self.run_fixed_cycle(axis).await,
            ControlPolicy::Adaptive(counters) => self.run_adaptive(axis, &counters).await,
        }
        log::debug!("{} controller stopped", axis.leader());
    }

    async fn acquire_axis(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            permit = Arc::clone(&self.axis_permit).acquire_owned() => permit.ok(),
            _ = self.signal.stopped() => None,
        }
    }

    /// YELLOW for the axis, then all RED. Returns false if stopped during YELLOW.
    ///
    /// The caller still holds the permit; all RED is published on every path
    /// before it is dropped.
    async fn finish_phase(&self, axis: Axis, green_held: bool) -> bool {
        let mut live = green_held;
        if live {
            self.board.publish_axis(axis, LightState::Yellow);
            self.notifier.log(&format!("{} axis YELLOW", axis));
            live = self.signal.sleep(self.timing.yellow()).await;
        }
        self.board.publish_all_red();
        self.notifier.log(&format!("{} axis RED", axis));
        live
    }

    async fn run_fixed_cycle(&self, axis: Axis) {
        let green = self.timing.green();
        let yellow = self.timing.yellow();

        // The horizontal axis waits out one vertical phase so the two alternate.
        let mut start_delay = self.timing.initial_red();
        if axis == Axis::Horizontal {
            start_delay += green + yellow;
        }
        if !self.signal.sleep(start_delay).await {
            return;
        }

        while self.signal.is_running() {
            let Some(permit) = self.acquire_axis().await else {
                break;
            };
            self.board.publish_green(axis);
            self.notifier.log(&format!("{} axis GREEN", axis));

            let held = self.signal.sleep(green).await;
            let live = self.finish_phase(axis, held).await;
            drop(permit);
            if !live {
                break;
            }

            // The other axis runs its GREEN + YELLOW meanwhile.
            if !self.signal.sleep(green + yellow).await {
                break;
            }
        }
    }

    async fn run_adaptive(&self, axis: Axis, counters: &DemandCounters) {
        if axis == Axis::Vertical
            && !self
                .signal
                .sleep(Duration::from_millis(self.adaptive.north_south_offset_ms))
                .await
        {
            return;
        }

        let idle_poll = Duration::from_millis(self.adaptive.idle_poll_ms);
        let green_poll = Duration::from_millis(self.adaptive.green_poll_ms);
        let rest = Duration::from_millis(self.adaptive.rest_ms);

        while self.signal.is_running() {
            if !counters.has_waiting(axis) {
                if !self.signal.sleep(idle_poll).await {
                    break;
                }
                continue;
            }

            log::debug!("{} waiting for the axis permit", axis.leader());
            let Some(permit) = self.acquire_axis().await else {
                break;
            };
            self.board.publish_green(axis);
            self.notifier.log(&format!("{} axis GREEN (demand)", axis));

            let mut held = true;
            let mut polls = 0;
            while polls < self.adaptive.max_green_polls && !counters.axis_clear(axis) {
                if !self.signal.sleep(green_poll).await {
                    held = false;
                    break;
                }
                polls += 1;
            }
            if held && polls == self.adaptive.max_green_polls && !counters.axis_clear(axis) {
                self.notifier.log(&format!(
                    "{} axis still busy after {:?}, ending GREEN",
                    axis,
                    self.adaptive.max_green()
                ));
            }

            let live = self.finish_phase(axis, held).await;
            drop(permit);
            if !live || !self.signal.sleep(rest).await {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::messages::TraceRecorder;
    use crate::shared_data::EventKind;

    fn controller(
        policy: ControlPolicy,
        recorder: &Arc<TraceRecorder>,
        signal: &RunSignal,
    ) -> Arc<TrafficLightController> {
        let board = Arc::new(LightBoard::full(recorder.clone()));
        Arc::new(TrafficLightController::new(
            board,
            policy,
            &SimulationConfig::default(),
            signal.clone(),
            recorder.clone(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_cycle_releases_permit_when_stopped_mid_green() {
        let recorder = Arc::new(TraceRecorder::new());
        let signal = RunSignal::new();
        let ctrl = controller(ControlPolicy::FixedCycle, &recorder, &signal);
        let handles = ctrl.spawn_leaders();
        assert_eq!(handles.len(), 2);

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(ctrl.current_state(Direction::SouthNorth), LightState::Green);
        assert_eq!(ctrl.free_axis_permits(), 0);

        signal.stop();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(ctrl.free_axis_permits(), 1);
        for d in Direction::ALL {
            assert_eq!(ctrl.current_state(d), LightState::Red);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn adaptive_green_ends_once_the_axis_empties() {
        let recorder = Arc::new(TraceRecorder::new());
        let signal = RunSignal::new();
        let counters = Arc::new(DemandCounters::new(recorder.clone()));
        let ctrl = controller(
            ControlPolicy::Adaptive(Arc::clone(&counters)),
            &recorder,
            &signal,
        );
        counters.vehicle_queued(Direction::WestEast);
        let handles = ctrl.spawn_leaders();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ctrl.current_state(Direction::EastWest), LightState::Green);

        counters.vehicle_admitted(Direction::WestEast);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(ctrl.current_state(Direction::EastWest), LightState::Green);

        counters.vehicle_departed(Direction::WestEast);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ctrl.current_state(Direction::EastWest), LightState::Yellow);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(ctrl.current_state(Direction::EastWest), LightState::Red);

        signal.stop();
        for h in handles {
            h.await.unwrap();
        }
        assert!(recorder
            .events_of(EventKind::LightChanged)
            .iter()
            .all(|e| e.direction.map(|d| d.axis()) == Some(Axis::Horizontal)));
    }

    async fn stop_and_join(signal: &RunSignal, handles: Vec<JoinHandle<()>>) {
        signal.stop();
        for h in handles {
            h.await.unwrap();
        }
    }

    fn assert_released(ctrl: &TrafficLightController) {
        assert_eq!(ctrl.free_axis_permits(), 1);
        for d in Direction::ALL {
            assert_eq!(ctrl.current_state(d), LightState::Red, "{d}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_cycle_releases_permit_when_stopped_during_yellow() {
        let recorder = Arc::new(TraceRecorder::new());
        let signal = RunSignal::new();
        let ctrl = controller(ControlPolicy::FixedCycle, &recorder, &signal);
        let handles = ctrl.spawn_leaders();

        tokio::time::sleep(Duration::from_millis(12_000)).await;
        assert_eq!(ctrl.current_state(Direction::NorthSouth), LightState::Yellow);
        assert_eq!(ctrl.free_axis_permits(), 0);

        stop_and_join(&signal, handles).await;
        assert_released(&ctrl);
    }

    #[tokio::test(start_paused = true)]
    async fn adaptive_releases_permit_when_stopped_mid_green() {
        let recorder = Arc::new(TraceRecorder::new());
        let signal = RunSignal::new();
        let counters = Arc::new(DemandCounters::new(recorder.clone()));
        counters.vehicle_queued(Direction::EastWest);
        let ctrl = controller(ControlPolicy::Adaptive(Arc::clone(&counters)), &recorder, &signal);
        let handles = ctrl.spawn_leaders();

        // Still polling for the axis to empty.
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(ctrl.current_state(Direction::EastWest), LightState::Green);
        assert_eq!(ctrl.free_axis_permits(), 0);

        stop_and_join(&signal, handles).await;
        assert_released(&ctrl);
    }

    #[tokio::test(start_paused = true)]
    async fn adaptive_releases_permit_when_stopped_during_yellow() {
        let recorder = Arc::new(TraceRecorder::new());
        let signal = RunSignal::new();
        let counters = Arc::new(DemandCounters::new(recorder.clone()));
        counters.vehicle_queued(Direction::WestEast);
        let ctrl = controller(ControlPolicy::Adaptive(Arc::clone(&counters)), &recorder, &signal);
        let handles = ctrl.spawn_leaders();

        tokio::time::sleep(Duration::from_millis(500)).await;
        counters.vehicle_admitted(Direction::WestEast);
        counters.vehicle_departed(Direction::WestEast);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(ctrl.current_state(Direction::WestEast), LightState::Yellow);
        assert_eq!(ctrl.free_axis_permits(), 0);

        stop_and_join(&signal, handles).await;
        assert_released(&ctrl);
    }

    #[tokio::test]
    async fn missing_light_reads_red() {
        let recorder = Arc::new(TraceRecorder::new());
        let board = Arc::new(LightBoard::empty(recorder.clone()));
        let ctrl = Arc::new(TrafficLightController::new(
            board,
            ControlPolicy::FixedCycle,
            &SimulationConfig::default(),
            RunSignal::new(),
            recorder,
        ));
        assert_eq!(ctrl.current_state(Direction::EastWest), LightState::Red);
        assert!(ctrl.spawn_leaders().is_empty());
    }
}
