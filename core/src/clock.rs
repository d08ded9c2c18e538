//! Simulation clock. Owns frame count, game time, speed control and pause.

use crate::types::{Seconds, Tick};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_tick: Tick,
    /// Scaled seconds elapsed since the clock started.
    pub game_time:    Seconds,
    /// Real seconds elapsed since the clock started.
    pub real_time:    Seconds,
    pub speed:        SimSpeed,
    pub paused:       bool,
}

/// Per-frame deltas handed to every deferred operation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameDelta {
    pub scaled:   Seconds,
    pub unscaled: Seconds,
}

impl FrameDelta {
    pub const fn new(scaled: Seconds, unscaled: Seconds) -> Self {
        Self { scaled, unscaled }
    }

    /// Same delta on both clocks.
    pub const fn uniform(dt: Seconds) -> Self {
        Self { scaled: dt, unscaled: dt }
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            current_tick: 0,
            game_time: 0.0,
            real_time: 0.0,
            speed: SimSpeed::Normal,
            paused: false,
        }
    }

    /// Advance one frame by `real_dt` wall-clock seconds.
    /// While paused the scaled delta is zero but unscaled time still flows.
    pub fn advance(&mut self, real_dt: Seconds) -> FrameDelta {
        let unscaled = real_dt.max(0.0);
        let scaled = if self.paused { 0.0 } else { unscaled * self.time_scale() };
        self.current_tick += 1;
        self.game_time += scaled;
        self.real_time += unscaled;
        FrameDelta { scaled, unscaled }
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    pub fn set_speed(&mut self, speed: SimSpeed) {
        self.speed = speed;
    }

    pub fn time_scale(&self) -> f64 {
        match self.speed {
            SimSpeed::Normal      => 1.0,
            SimSpeed::Accelerated => 2.0,
            SimSpeed::FastForward => 4.0,
        }
    }
}

impl Default for SimClock {
    fn default() -> Self { Self::new() }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimSpeed {
    Normal,       // 1x
    Accelerated,  // 2x
    FastForward,  // 4x
}
