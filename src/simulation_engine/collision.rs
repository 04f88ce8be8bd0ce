use crate::simulation_engine::directions::Direction;
use crate::simulation_engine::intersections::directions_can_collide;
use crate::simulation_engine::vehicles::{Extent, VehicleId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Where one vehicle is at the instant of a check.
#[derive(Debug, Clone, Copy)]
pub struct Footprint {
    pub id: VehicleId,
    pub direction: Direction,
    pub extent: Extent,
}

/// First pair of overlapping vehicles on colliding directions, if any.
///
/// Pairwise over every footprint; fine for the handful of vehicles an
/// intersection holds at once.
pub fn find_collision(footprints: &[Footprint]) -> Option<(VehicleId, VehicleId)> {
    for (i, a) in footprints.iter().enumerate() {
        for b in &footprints[i + 1..] {
            if directions_can_collide(a.direction, b.direction) && a.extent.intersects(&b.extent) {
                return Some((a.id, b.id));
            }
        }
    }
    None
}

/// One-shot collision flag for a run.
///
/// Once raised it stays raised; later checks are skipped entirely.
#[derive(Debug, Default)]
pub struct CollisionDetector {
    triggered: AtomicBool,
    detections: AtomicU64,
}

impl CollisionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collision_detected(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Number of times detection fired. Never more than one.
    pub fn detections(&self) -> u64 {
        self.detections.load(Ordering::Acquire)
    }

    /// Checks the footprints and raises the flag on the first unsafe overlap.
    ///
    /// Returns the colliding pair only to the caller that raised the flag.
    pub fn detect(&self, footprints: &[Footprint]) -> Option<(VehicleId, VehicleId)> {
        if self.is_collision_detected() {
            return None;
        }
        let pair = find_collision(footprints)?;
        self.triggered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.detections.fetch_add(1, Ordering::AcqRel);
        Some(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_engine::vehicles::Vehicle;

    fn at_center(id: VehicleId, direction: Direction) -> Footprint {
        Footprint {
            id,
            direction,
            extent: Extent::square(240.0, 240.0, 20.0),
        }
    }

    #[test]
    fn opposite_directions_overlapping_are_safe() {
        let detector = CollisionDetector::new();
        let a = at_center(1, Direction::NorthSouth);
        let b = at_center(2, Direction::SouthNorth);
        assert_eq!(detector.detect(&[a, b]), None);
        assert!(!detector.is_collision_detected());
    }

    #[test]
    fn same_direction_overlap_is_safe() {
        let detector = CollisionDetector::new();
        let a = at_center(1, Direction::EastWest);
        let b = at_center(2, Direction::EastWest);
        assert_eq!(detector.detect(&[a, b]), None);
    }

    #[test]
    fn perpendicular_overlap_fires_exactly_once() {
        let detector = CollisionDetector::new();
        let a = at_center(1, Direction::NorthSouth);
        let c = at_center(3, Direction::EastWest);
        assert_eq!(detector.detect(&[a, c]), Some((1, 3)));
        assert!(detector.is_collision_detected());

        let d = at_center(4, Direction::SouthNorth);
        let e = at_center(5, Direction::WestEast);
        assert_eq!(detector.detect(&[d, e]), None);
        assert!(detector.is_collision_detected());
        assert_eq!(detector.detections(), 1);
    }

    #[test]
    fn perpendicular_but_apart_is_not_a_collision() {
        let down = Vehicle::new(1, Direction::NorthSouth, 0);
        let west = Vehicle::new(2, Direction::EastWest, 0);
        let footprints = [
            Footprint { id: 1, direction: down.direction, extent: down.extent_at(0.1) },
            Footprint { id: 2, direction: west.direction, extent: west.extent_at(0.9) },
        ];
        assert_eq!(find_collision(&footprints), None);
    }

    #[test]
    fn concurrent_detectors_raise_the_flag_once() {
        let detector = std::sync::Arc::new(CollisionDetector::new());
        let footprints = [at_center(1, Direction::WestEast), at_center(2, Direction::SouthNorth)];
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let detector = std::sync::Arc::clone(&detector);
                std::thread::spawn(move || detector.detect(&footprints).is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(detector.detections(), 1);
    }
}
