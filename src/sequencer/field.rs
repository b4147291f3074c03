//! field.rs
//! Fixed field geometry and the small closed sets the sequencer works with.

use std::f64::consts::PI;

use crate::hardware::Display;

/// Cell on the line-intersection grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

pub const REACTOR_A: GridPos = GridPos::new(1, 0);
pub const REACTOR_B: GridPos = GridPos::new(6, 0);

/// Storage tubes 1..=4 (index = id - 1)
pub const STORAGE: [GridPos; 4] = [
    GridPos::new(5, 1),
    GridPos::new(4, 1),
    GridPos::new(3, 1),
    GridPos::new(2, 1),
];

/// Supply tubes 1..=4 (index = id - 1)
pub const SUPPLY: [GridPos; 4] = [
    GridPos::new(2, -1),
    GridPos::new(3, -1),
    GridPos::new(4, -1),
    GridPos::new(5, -1),
];

/// Cardinal headings relative to the startup reference (rad).
pub const HEADING_UP: f64 = 0.0;
pub const HEADING_RIGHT: f64 = PI * 0.5;
pub const HEADING_DOWN: f64 = PI;
pub const HEADING_LEFT: f64 = PI * 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reactor {
    A,
    B,
}

impl Reactor {
    pub fn cell(self) -> GridPos {
        match self {
            Reactor::A => REACTOR_A,
            Reactor::B => REACTOR_B,
        }
    }

    pub fn other(self) -> Reactor {
        match self {
            Reactor::A => Reactor::B,
            Reactor::B => Reactor::A,
        }
    }

    /// Storage ids nearest first: A sits next to tube 4, B next to tube 1.
    pub fn storage_order(self) -> [u8; 4] {
        match self {
            Reactor::A => [4, 3, 2, 1],
            Reactor::B => [1, 2, 3, 4],
        }
    }

    /// Supply ids nearest first: A sits next to tube 1, B next to tube 4.
    pub fn supply_order(self) -> [u8; 4] {
        match self {
            Reactor::A => [1, 2, 3, 4],
            Reactor::B => [4, 3, 2, 1],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    EmptyReactor,
    FillStorage,
    GetSupply,
    FillReactor,
}

impl Task {
    /// Next task in the fixed cycle.
    pub fn next(self) -> Task {
        match self {
            Task::EmptyReactor => Task::FillStorage,
            Task::FillStorage => Task::GetSupply,
            Task::GetSupply => Task::FillReactor,
            Task::FillReactor => Task::EmptyReactor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiationLevel {
    None,
    Low,
    High,
}

impl RadiationLevel {
    /// Level after the gripper finishes during `task`.
    pub fn after_grip(task: Task) -> RadiationLevel {
        match task {
            Task::GetSupply => RadiationLevel::High,
            Task::EmptyReactor => RadiationLevel::Low,
            Task::FillStorage | Task::FillReactor => RadiationLevel::None,
        }
    }

    pub fn display(self) -> Display {
        match self {
            RadiationLevel::High => Display::Red,
            RadiationLevel::Low => Display::Green,
            RadiationLevel::None => Display::Blue,
        }
    }

    /// Radiation alert payload: Some(true) new rod, Some(false) spent rod.
    pub fn alert(self) -> Option<bool> {
        match self {
            RadiationLevel::High => Some(true),
            RadiationLevel::Low => Some(false),
            RadiationLevel::None => None,
        }
    }
}
