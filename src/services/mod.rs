//! Collaborators the core drives but does not own: the lamp output, the
//! simulation clock, the random source and the spatial snapshot.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// On/off lighting output
pub trait Actuator: Send {
    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

/// Shared lamp output. Clones observe the same lamp.
#[derive(Clone, Debug, Default)]
pub struct LampHandle {
    enabled: Arc<AtomicBool>,
    /// Number of on/off edges seen
    switches: Arc<AtomicU64>,
}

impl LampHandle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
            switches: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn switches(&self) -> u64 {
        self.switches.load(Ordering::Relaxed)
    }
}

impl Actuator for LampHandle {
    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::Relaxed) != enabled {
            self.switches.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// Read-only simulation time in seconds
pub trait Clock {
    fn now(&self) -> f64;
    /// Length of the current tick
    fn delta(&self) -> f64;
}

/// Fixed-step clock advanced by the scheduler
#[derive(Clone, Debug, Default)]
pub struct SimClock {
    now: f64,
    delta: f64,
    ticks: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, delta: f64) {
        self.delta = delta;
        self.now += delta;
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Clock for SimClock {
    fn now(&self) -> f64 {
        self.now
    }

    fn delta(&self) -> f64 {
        self.delta
    }
}

/// Uniform samples in [0, 1)
pub trait RandomSource: Send {
    fn sample(&mut self) -> f64;
}

pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl RandomSource for SeededRandom {
    fn sample(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Position and orientation captured at startup and restored on recovery
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: [f32; 3],
    /// Quaternion (x, y, z, w)
    pub orientation: [f32; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Host object that carries a transform
pub trait Spatial {
    fn transform(&self) -> Transform;
    fn set_transform(&mut self, transform: Transform);
}
