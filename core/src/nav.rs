//! Navigation seam. Pathfinding belongs to the host; the core only asks an
//! agent to move somewhere and later asks whether it got there.

use crate::types::{Point, Seconds};
use std::cell::RefCell;
use std::collections::HashMap;

pub trait Navigator {
    /// Ask `agent` to walk to `target`. Returns false if the request was
    /// rejected (no path, unknown agent); callers treat that as arrival.
    fn move_to(&self, agent: &str, target: Point, speed: f64) -> bool;

    /// True once the agent is at its last requested destination, or when it
    /// has no destination at all.
    fn has_arrived(&self, agent: &str) -> bool;

    /// Put a freshly spawned agent at `position`.
    fn warp(&self, _agent: &str, _position: Point) {}

    /// Drop everything known about `agent`. Called when it is despawned.
    fn forget(&self, _agent: &str) {}

    /// Move agents forward by `dt` seconds of game time.
    fn advance(&self, _dt: Seconds) {}
}

#[derive(Debug, Clone, Copy)]
struct Walker {
    position: Point,
    target:   Option<Point>,
    speed:    f64,
}

/// Straight-line movement at constant speed. Good enough for headless runs.
#[derive(Debug, Default)]
pub struct LinearNavigator {
    walkers: RefCell<HashMap<String, Walker>>,
}

/// Distance under which a walker counts as arrived.
const ARRIVAL_EPSILON: f64 = 1e-6;

impl LinearNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, agent: &str) -> Option<Point> {
        self.walkers.borrow().get(agent).map(|w| w.position)
    }
}

impl Navigator for LinearNavigator {
    fn warp(&self, agent: &str, position: Point) {
        self.walkers.borrow_mut().insert(
            agent.to_string(),
            Walker { position, target: None, speed: 0.0 },
        );
    }

    fn move_to(&self, agent: &str, target: Point, speed: f64) -> bool {
        if speed <= 0.0 {
            return false;
        }
        let mut walkers = self.walkers.borrow_mut();
        let Some(walker) = walkers.get_mut(agent) else {
            return false;
        };
        walker.target = Some(target);
        walker.speed = speed;
        true
    }

    fn forget(&self, agent: &str) {
        self.walkers.borrow_mut().remove(agent);
    }

    fn has_arrived(&self, agent: &str) -> bool {
        self.walkers
            .borrow()
            .get(agent)
            .is_none_or(|w| w.target.is_none())
    }

    fn advance(&self, dt: Seconds) {
        if dt <= 0.0 {
            return;
        }
        for walker in self.walkers.borrow_mut().values_mut() {
            let Some(target) = walker.target else { continue };
            let remaining = walker.position.distance(&target);
            let step = walker.speed * dt;
            if remaining <= step + ARRIVAL_EPSILON {
                walker.position = target;
                walker.target = None;
            } else {
                let t = step / remaining;
                walker.position = Point::new(
                    walker.position.x + (target.x - walker.position.x) * t,
                    walker.position.z + (target.z - walker.position.z) * t,
                );
            }
        }
    }
}

/// Teleports on every request. For tests that don't care about travel.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantNavigator;

impl Navigator for InstantNavigator {
    fn move_to(&self, _agent: &str, _target: Point, _speed: f64) -> bool {
        true
    }

    fn has_arrived(&self, _agent: &str) -> bool {
        true
    }
}
