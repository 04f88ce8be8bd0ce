use serde::{Deserialize, Serialize};
use std::fmt;

/// The four travel directions through the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    NorthSouth,
    SouthNorth,
    EastWest,
    WestEast,
}

/// The road a direction travels on. Opposite directions share an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// The possible states for a traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightState {
    Green,
    Yellow,
    Red,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::NorthSouth,
        Direction::SouthNorth,
        Direction::EastWest,
        Direction::WestEast,
    ];

    /// Dense index, usable for per-direction arrays.
    pub const fn index(self) -> usize {
        match self {
            Direction::NorthSouth => 0,
            Direction::SouthNorth => 1,
            Direction::EastWest => 2,
            Direction::WestEast => 3,
        }
    }

    pub const fn opposite(self) -> Direction {
        OPPOSITE[self.index()]
    }

    pub const fn axis(self) -> Axis {
        AXIS[self.index()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::NorthSouth => "North-South",
            Direction::SouthNorth => "South-North",
            Direction::EastWest => "East-West",
            Direction::WestEast => "West-East",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

const OPPOSITE: [Direction; 4] = [
    Direction::SouthNorth,
    Direction::NorthSouth,
    Direction::WestEast,
    Direction::EastWest,
];

const AXIS: [Axis; 4] = [Axis::Vertical, Axis::Vertical, Axis::Horizontal, Axis::Horizontal];

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::Vertical, Axis::Horizontal];

    pub const fn leader(self) -> Direction {
        match self {
            Axis::Vertical => Direction::NorthSouth,
            Axis::Horizontal => Direction::EastWest,
        }
    }

    pub const fn follower(self) -> Direction {
        match self {
            Axis::Vertical => Direction::SouthNorth,
            Axis::Horizontal => Direction::WestEast,
        }
    }

    pub const fn directions(self) -> [Direction; 2] {
        [self.leader(), self.follower()]
    }

    pub const fn perpendicular(self) -> Axis {
        match self {
            Axis::Vertical => Axis::Horizontal,
            Axis::Horizontal => Axis::Vertical,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Axis::Vertical => f.write_str("North-South/South-North"),
            Axis::Horizontal => f.write_str("East-West/West-East"),
        }
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LightState::Green => f.write_str("GREEN"),
            LightState::Yellow => f.write_str("YELLOW"),
            LightState::Red => f.write_str("RED"),
        }
    }
}
