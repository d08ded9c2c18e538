//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};

/// A scheduler frame. One tick = one host frame.
pub type Tick = u64;

/// A stable, unique identifier for any entity in the simulation.
pub type EntityId = String;

/// The canonical run identifier.
pub type RunId = String;

/// Seconds of game or wall-clock time.
pub type Seconds = f64;

/// Whole units of gold or fish.
pub type Amount = i64;

/// A position on the ground plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }
}
