use crate::communication::messages::SharedNotifier;
use crate::config::VehicleTiming;
use crate::control_system::demand_counters::{DemandChange, DemandCounters, DemandEvent};
use crate::shared_data::RunSummary;
use crate::simulation_engine::collision::{CollisionDetector, Footprint};
use crate::simulation_engine::directions::Direction;
use crate::simulation_engine::intersections::{CrossingSlot, Intersection};
use crate::simulation_engine::run_signal::RunSignal;
use crate::simulation_engine::vehicles::{Vehicle, VehicleId, VehicleState};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How queued vehicles get into the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingMode {
    /// Start crossing at once; nothing arbitrates access.
    Unsynchronized,
    /// Wait for GREEN and a free place in the box.
    LightControlled,
}

#[derive(Default)]
struct Registry {
    vehicles: HashMap<VehicleId, Vehicle>,
    /// In-flight vehicles per direction, in arrival order.
    queues: [VecDeque<VehicleId>; 4],
    spawned: u64,
    departed: u64,
    removed: u64,
}

impl Registry {
    fn take(&mut self, id: VehicleId) -> Option<Vehicle> {
        let vehicle = self.vehicles.remove(&id)?;
        self.queues[vehicle.direction.index()].retain(|queued| *queued != id);
        Some(vehicle)
    }
}

/// Owns every vehicle of a run from spawn to departure.
///
/// Registry and counter updates happen under the registry lock; notifier
/// callbacks fire only after it is released, so a notifier may call back in.
pub struct VehicleManager {
    intersection: Arc<Intersection>,
    mode: CrossingMode,
    counters: Option<Arc<DemandCounters>>,
    detector: CollisionDetector,
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    timing: VehicleTiming,
    signal: RunSignal,
    notifier: SharedNotifier,
}

impl VehicleManager {
    pub fn new(
        intersection: Arc<Intersection>,
        mode: CrossingMode,
        counters: Option<Arc<DemandCounters>>,
        timing: VehicleTiming,
        signal: RunSignal,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            intersection,
            mode,
            counters,
            detector: CollisionDetector::new(),
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
            timing,
            signal,
            notifier,
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, direction: Direction, event: DemandEvent) -> Option<DemandChange> {
        self.counters
            .as_ref()
            .map(|counters| counters.record(direction, event))
    }

    fn announce(&self, changes: impl IntoIterator<Item = DemandChange>) {
        if let Some(counters) = &self.counters {
            for change in changes {
                counters.announce(change);
            }
        }
    }

    pub fn intersection(&self) -> &Arc<Intersection> {
        &self.intersection
    }

    /// Creates a QUEUED vehicle at the back of its direction's queue.
    ///
    /// Never refuses; arrival caps are enforced by the generators.
    pub fn spawn(&self, direction: Direction) -> Vehicle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (vehicle, change) = {
            let mut registry = self.registry();
            let queue = &mut registry.queues[direction.index()];
            let vehicle = Vehicle::new(id, direction, queue.len());
            queue.push_back(id);
            registry.vehicles.insert(id, vehicle.clone());
            registry.spawned += 1;
            (vehicle, self.record(direction, DemandEvent::Queued))
        };
        self.announce(change);
        self.notifier.vehicle_spawned(&vehicle);
        vehicle
    }

    /// Starts the vehicle's trip through the intersection as its own task.
    pub fn admit_and_cross(self: &Arc<Self>, vehicle: &Vehicle) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let id = vehicle.id;
        let direction = vehicle.direction;
        tokio::spawn(async move {
            match manager.mode {
                CrossingMode::Unsynchronized => manager.cross_now(id).await,
                CrossingMode::LightControlled => manager.cross_on_green(id, direction).await,
            }
        })
    }

    async fn cross_now(&self, id: VehicleId) {
        if !self.begin_crossing(id) {
            return;
        }
        if self.signal.sleep(self.timing.transit()).await {
            self.complete(id);
        }
    }

    async fn cross_on_green(&self, id: VehicleId, direction: Direction) {
        let Some(slot) = self.wait_for_admission(id, direction).await else {
            return;
        };
        if !self.begin_crossing(id) {
            return;
        }

        let clearance = self.timing.box_clearance();
        let cleared = self.signal.sleep(clearance).await;
        drop(slot);
        if !cleared {
            return;
        }
        let remaining = self.timing.transit().saturating_sub(clearance);
        if self.signal.sleep(remaining).await {
            self.complete(id);
        }
    }

    /// Polls the light until GREEN, then takes a place in the box.
    ///
    /// Gives up if the run stops or the vehicle is removed meanwhile.
    async fn wait_for_admission(&self, id: VehicleId, direction: Direction) -> Option<CrossingSlot> {
        let poll = self.timing.admission_poll();
        loop {
            if !self.is_tracked(id) || !self.signal.is_running() {
                return None;
            }
            if self.intersection.can_pass(direction) {
                let slot = tokio::select! {
                    slot = self.intersection.enter() => slot?,
                    _ = self.signal.stopped() => return None,
                };
                // The light may have changed while waiting for the slot.
                if self.intersection.can_pass(direction) {
                    return Some(slot);
                }
                drop(slot);
            }
            if !self.signal.sleep(poll).await {
                return None;
            }
        }
    }

    /// QUEUED -> CROSSING. False if the vehicle is gone or already moving.
    pub fn begin_crossing(&self, id: VehicleId) -> bool {
        let (vehicle, change) = {
            let mut registry = self.registry();
            let Some(vehicle) = registry.vehicles.get_mut(&id) else {
                return false;
            };
            if vehicle.state != VehicleState::Queued {
                return false;
            }
            vehicle.state = VehicleState::Crossing;
            vehicle.crossing_since = Some(Instant::now());
            let vehicle = vehicle.clone();
            let change = self.record(vehicle.direction, DemandEvent::Admitted);
            (vehicle, change)
        };
        self.announce(change);
        self.notifier.vehicle_advanced(&vehicle);
        true
    }

    /// CROSSING -> DEPARTED; the vehicle leaves its queue and tracking.
    pub fn complete(&self, id: VehicleId) -> bool {
        let (vehicle, change) = {
            let mut registry = self.registry();
            match registry.vehicles.get(&id) {
                Some(v) if v.state == VehicleState::Crossing => {}
                _ => return false,
            }
            let Some(mut vehicle) = registry.take(id) else {
                return false;
            };
            registry.departed += 1;
            let change = self.record(vehicle.direction, DemandEvent::Departed);
            vehicle.state = VehicleState::Departed;
            (vehicle, change)
        };
        self.announce(change);
        self.notifier.vehicle_advanced(&vehicle);
        self.notifier.vehicle_removed(&vehicle);
        true
    }

    /// Drops a vehicle at any stage. Removing an unknown id does nothing.
    pub fn remove(&self, id: VehicleId) -> bool {
        let (vehicle, change) = {
            let mut registry = self.registry();
            let Some(vehicle) = registry.take(id) else {
                return false;
            };
            registry.removed += 1;
            let change = self.release_counters(&vehicle);
            (vehicle, change)
        };
        self.announce(change);
        self.notifier.vehicle_removed(&vehicle);
        true
    }

    /// Counter step for a vehicle leaving from its current state.
    fn release_counters(&self, vehicle: &Vehicle) -> Option<DemandChange> {
        let event = match vehicle.state {
            VehicleState::Queued => DemandEvent::Withdrawn,
            VehicleState::Crossing => DemandEvent::Departed,
            VehicleState::Departed => return None,
        };
        self.record(vehicle.direction, event)
    }

    pub fn is_tracked(&self, id: VehicleId) -> bool {
        self.registry().vehicles.contains_key(&id)
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<Vehicle> {
        self.registry().vehicles.get(&id).cloned()
    }

    /// Vehicles of `direction` still queued or crossing, in arrival order.
    pub fn queue(&self, direction: Direction) -> Vec<VehicleId> {
        self.registry().queues[direction.index()].iter().copied().collect()
    }

    pub fn in_flight(&self, direction: Direction) -> usize {
        self.registry().queues[direction.index()].len()
    }

    pub fn count_in_state(&self, direction: Direction, state: VehicleState) -> usize {
        self.registry()
            .vehicles
            .values()
            .filter(|v| v.direction == direction && v.state == state)
            .count()
    }

    pub fn is_collision_detected(&self) -> bool {
        self.detector.is_collision_detected()
    }

    /// One detection pass over every tracked vehicle.
    ///
    /// Footprints are taken and the colliding pair consumed under the same
    /// registry lock, so a vehicle that already departed is never evaluated.
    pub fn check_collisions(&self) -> Option<(VehicleId, VehicleId)> {
        if self.detector.is_collision_detected() {
            return None;
        }
        let now = Instant::now();
        let transit = self.timing.transit();
        let consumed = {
            let mut registry = self.registry();
            let footprints: Vec<Footprint> = registry
                .vehicles
                .values()
                .map(|v| Footprint {
                    id: v.id,
                    direction: v.direction,
                    extent: v.extent(now, transit),
                })
                .collect();
            let (first, second) = self.detector.detect(&footprints)?;
            let mut consumed = Vec::with_capacity(2);
            let mut changes = Vec::with_capacity(2);
            for id in [first, second] {
                if let Some(vehicle) = registry.take(id) {
                    registry.removed += 1;
                    changes.extend(self.release_counters(&vehicle));
                    consumed.push(vehicle);
                }
            }
            (first, second, consumed, changes)
        };

        let (first, second, vehicles, changes) = consumed;
        self.announce(changes);
        self.notifier.collision(first, second);
        self.notifier
            .log(&format!("BOOM! Collision between vehicles {} and {}", first, second));
        for vehicle in &vehicles {
            self.notifier.vehicle_removed(vehicle);
        }
        Some((first, second))
    }

    /// Runs [`check_collisions`](Self::check_collisions) periodically until a
    /// collision is found or the run stops.
    pub fn spawn_collision_watch(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let period = manager.timing.collision_check();
            while manager.signal.sleep(period).await {
                if manager.check_collisions().is_some() || manager.is_collision_detected() {
                    break;
                }
            }
        })
    }

    pub fn summary(&self) -> RunSummary {
        let registry = self.registry();
        RunSummary {
            spawned: registry.spawned,
            departed: registry.departed,
            removed: registry.removed,
            active: registry.vehicles.len(),
            collision_detected: self.detector.is_collision_detected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::messages::{NoopNotifier, Notifier, TraceRecorder};
    use crate::control_system::light_board::LightBoard;
    use crate::shared_data::EventKind;
    use crate::simulation_engine::directions::Axis;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::{mpsc, OnceLock};
    use std::time::Duration;

    fn manager(
        mode: CrossingMode,
        counters: Option<Arc<DemandCounters>>,
    ) -> (Arc<VehicleManager>, Arc<LightBoard>) {
        let board = Arc::new(LightBoard::full(Arc::new(NoopNotifier)));
        let intersection = Arc::new(Intersection::new(Arc::clone(&board)));
        let manager = VehicleManager::new(
            intersection,
            mode,
            counters,
            VehicleTiming::default(),
            RunSignal::new(),
            Arc::new(NoopNotifier),
        );
        (Arc::new(manager), board)
    }

    #[test]
    fn spawn_queues_in_arrival_order_with_unique_ids() {
        let (m, _) = manager(CrossingMode::LightControlled, None);
        let a = m.spawn(Direction::EastWest);
        let b = m.spawn(Direction::EastWest);
        let c = m.spawn(Direction::NorthSouth);
        assert_eq!(a.state, VehicleState::Queued);
        assert_eq!((a.queue_slot, b.queue_slot, c.queue_slot), (0, 1, 0));
        assert_eq!(m.queue(Direction::EastWest), vec![a.id, b.id]);
        assert_ne!(a.id, b.id);
        assert_eq!(m.in_flight(Direction::EastWest), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let (m, _) = manager(CrossingMode::LightControlled, None);
        let v = m.spawn(Direction::SouthNorth);
        assert!(m.remove(v.id));
        assert!(!m.remove(v.id));
        assert!(m.queue(Direction::SouthNorth).is_empty());
        assert_eq!(m.summary().removed, 1);
    }

    #[test]
    fn complete_requires_crossing() {
        let (m, _) = manager(CrossingMode::LightControlled, None);
        let v = m.spawn(Direction::WestEast);
        assert!(!m.complete(v.id));
        assert!(m.begin_crossing(v.id));
        assert!(!m.begin_crossing(v.id));
        assert!(m.complete(v.id));
        assert!(!m.is_tracked(v.id));
        assert_eq!(m.summary().departed, 1);
    }

    #[test]
    fn counters_track_lifecycle_for_any_sequence() {
        let counters = Arc::new(DemandCounters::new(Arc::new(NoopNotifier)));
        let (m, _) = manager(CrossingMode::LightControlled, Some(Arc::clone(&counters)));
        let mut rng = StdRng::seed_from_u64(42);
        let mut ids = Vec::new();

        for _ in 0..2000 {
            match rng.random_range(0..4) {
                0 => ids.push(m.spawn(Direction::ALL[rng.random_range(0..4)]).id),
                _ if ids.is_empty() => continue,
                op => {
                    let id = ids[rng.random_range(0..ids.len())];
                    match op {
                        1 => {
                            m.begin_crossing(id);
                        }
                        2 => {
                            m.complete(id);
                        }
                        _ => {
                            m.remove(id);
                        }
                    }
                }
            }
            for d in Direction::ALL {
                let demand = counters.demand(d);
                assert_eq!(demand.waiting as usize, m.count_in_state(d, VehicleState::Queued));
                assert_eq!(demand.passing as usize, m.count_in_state(d, VehicleState::Crossing));
            }
        }
    }

    /// Reads the manager back from inside its callbacks, like a renderer would.
    #[derive(Default)]
    struct ReadingNotifier {
        manager: OnceLock<Arc<VehicleManager>>,
        waiting_seen: Mutex<Vec<(u32, usize)>>,
        in_flight_seen: Mutex<Vec<usize>>,
    }

    impl Notifier for ReadingNotifier {
        fn waiting_count(&self, direction: Direction, count: u32) {
            if let Some(manager) = self.manager.get() {
                let queued = manager.count_in_state(direction, VehicleState::Queued);
                self.waiting_seen.lock().unwrap().push((count, queued));
            }
        }

        fn vehicle_spawned(&self, vehicle: &Vehicle) {
            if let Some(manager) = self.manager.get() {
                self.in_flight_seen
                    .lock()
                    .unwrap()
                    .push(manager.in_flight(vehicle.direction));
            }
        }

        fn vehicle_removed(&self, vehicle: &Vehicle) {
            if let Some(manager) = self.manager.get() {
                assert!(!manager.is_tracked(vehicle.id));
            }
        }
    }

    #[test]
    fn notifier_can_query_the_manager_from_its_callbacks() {
        let notifier = Arc::new(ReadingNotifier::default());
        let counters = Arc::new(DemandCounters::new(notifier.clone()));
        let board = Arc::new(LightBoard::full(notifier.clone()));
        let m = Arc::new(VehicleManager::new(
            Arc::new(Intersection::new(board)),
            CrossingMode::LightControlled,
            Some(counters),
            VehicleTiming::default(),
            RunSignal::new(),
            notifier.clone(),
        ));
        let _ = notifier.manager.set(Arc::clone(&m));

        let (done_tx, done_rx) = mpsc::channel();
        {
            let m = Arc::clone(&m);
            std::thread::spawn(move || {
                let a = m.spawn(Direction::NorthSouth);
                let b = m.spawn(Direction::NorthSouth);
                m.begin_crossing(a.id);
                m.remove(b.id);
                let _ = done_tx.send(());
            });
        }
        assert!(
            done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
            "manager blocked on its own notifier"
        );

        assert_eq!(*notifier.in_flight_seen.lock().unwrap(), vec![1, 2]);
        // Each announced waiting count matches the registry it was read against.
        for (count, queued) in notifier.waiting_seen.lock().unwrap().iter() {
            assert_eq!(*count as usize, *queued);
        }
        assert_eq!(notifier.waiting_seen.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn unsynchronized_vehicle_crosses_at_once() {
        let (m, _) = manager(CrossingMode::Unsynchronized, None);
        let v = m.spawn(Direction::NorthSouth);
        let trip = m.admit_and_cross(&v);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(m.vehicle(v.id).unwrap().state, VehicleState::Crossing);

        trip.await.unwrap();
        assert!(!m.is_tracked(v.id));
        assert_eq!(m.summary().departed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn light_controlled_vehicle_waits_for_green() {
        let (m, board) = manager(CrossingMode::LightControlled, None);
        let v = m.spawn(Direction::SouthNorth);
        let trip = m.admit_and_cross(&v);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(m.vehicle(v.id).unwrap().state, VehicleState::Queued);

        board.publish_green(Axis::Vertical);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(m.vehicle(v.id).unwrap().state, VehicleState::Crossing);
        assert_eq!(m.intersection().free_slots(), 1);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(m.intersection().free_slots(), 2);

        trip.await.unwrap();
        assert!(!m.is_tracked(v.id));
    }

    #[tokio::test(start_paused = true)]
    async fn removed_vehicle_stops_waiting() {
        let (m, _) = manager(CrossingMode::LightControlled, None);
        let v = m.spawn(Direction::EastWest);
        let trip = m.admit_and_cross(&v);
        tokio::time::sleep(Duration::from_millis(700)).await;
        m.remove(v.id);
        trip.await.unwrap();
        assert_eq!(m.summary().active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn collision_consumes_both_vehicles_once() {
        let recorder = Arc::new(TraceRecorder::new());
        let intersection = Arc::new(Intersection::without_lights(recorder.clone()));
        let m = Arc::new(VehicleManager::new(
            intersection,
            CrossingMode::Unsynchronized,
            None,
            VehicleTiming::default(),
            RunSignal::new(),
            recorder.clone(),
        ));
        let down = m.spawn(Direction::NorthSouth);
        let west = m.spawn(Direction::EastWest);
        let safe = m.spawn(Direction::SouthNorth);
        let trips = [m.admit_and_cross(&down), m.admit_and_cross(&west), m.admit_and_cross(&safe)];
        let watch = m.spawn_collision_watch();

        watch.await.unwrap();
        assert!(m.is_collision_detected());
        assert!(!m.is_tracked(down.id));
        assert!(!m.is_tracked(west.id));
        assert_eq!(recorder.events_of(EventKind::Collision).len(), 1);
        assert_eq!(m.check_collisions(), None);

        for trip in trips {
            trip.await.unwrap();
        }
        assert_eq!(m.summary().departed, 1);
    }
}
