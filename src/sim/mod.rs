//! Fixed-step scheduler: owns the clock, the blackboard, the flicker strip
//! and every light, and updates each light once per tick in a stable order.

mod watcher;

pub use watcher::run_update_logger;

use crate::blackboard::Blackboard;
use crate::config::AmbientConfig;
use crate::fsm::State;
use crate::light::{LightState, SmartLight};
use crate::services::{Actuator, Clock, LampHandle, RandomSource, SeededRandom, SimClock};
use crate::strip::{AmbientFlicker, Strip};
use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};


/// Per-lamp summary after a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightReport {
    pub name: String,
    pub state: String,
    pub lamp_enabled: bool,
    pub switches: u64,
}

pub struct Simulation {
    board: Arc<Blackboard>,
    strip: Arc<AmbientFlicker>,
    clock: SimClock,
    tick_seconds: f64,
    lights: Vec<SmartLight>,
    lamps: Vec<LampHandle>,
}

impl Simulation {
    /// Build and start every configured light at t = 0.
    ///
    /// Light names double as blackboard keys, so they must be unique.
    pub fn from_config(config: &AmbientConfig) -> Result<Self> {
        let sim = &config.simulation;
        if sim.tick_ms == 0 {
            bail!("tick_ms must be positive");
        }

        let board = Arc::new(Blackboard::new());
        let strip = Arc::new(AmbientFlicker::with_id(sim.strip.clone(), Arc::clone(&board)));
        let clock = SimClock::new();

        let names: HashSet<&str> = config.lights.iter().map(|l| l.name.as_str()).collect();
        let mut lights = Vec::with_capacity(config.lights.len());
        let mut lamps = Vec::with_capacity(config.lights.len());

        for (i, spec) in config.lights.iter().enumerate() {
            for neighbor in spec.neighbors.iter().filter(|n| !names.contains(n.as_str())) {
                warn!(light = %spec.name, neighbor = %neighbor, "Unknown neighbor");
            }

            let rng: Box<dyn RandomSource> = match sim.seed {
                Some(seed) => Box::new(SeededRandom::from_seed(seed.wrapping_add(i as u64))),
                None => Box::new(SeededRandom::from_entropy()),
            };
            let params = spec.flicker.clone().unwrap_or_else(|| config.flicker.clone());
            let lamp = LampHandle::new(false);

            let mut light = SmartLight::new(
                spec.name.clone(),
                params,
                Arc::clone(&board),
                Box::new(lamp.clone()),
                rng,
            )
            .with_neighbors(spec.neighbors.clone())
            .with_transform(spec.transform())
            .with_strip_name(strip.id());
            light.attach_strip(strip.clone());

            if !light.start(&clock) || !light.has_own_key() {
                bail!("Light name already in use: {}", spec.name);
            }

            lights.push(light);
            lamps.push(lamp);
        }

        info!(
            lights = lights.len(),
            tick_ms = sim.tick_ms,
            strip = %strip.id(),
            "Simulation ready"
        );

        Ok(Self {
            board,
            strip,
            clock,
            tick_seconds: sim.tick_seconds(),
            lights,
            lamps,
        })
    }

    /// Advance the clock one tick and update every light
    pub fn step(&mut self) {
        self.clock.advance(self.tick_seconds);
        for light in &mut self.lights {
            light.update(&self.clock);
        }
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn reports(&self) -> Vec<LightReport> {
        self.lights
            .iter()
            .zip(&self.lamps)
            .map(|(light, lamp)| LightReport {
                name: light.client().key().unwrap_or_default().to_string(),
                state: light.state().to_string(),
                lamp_enabled: lamp.is_enabled(),
                switches: lamp.switches(),
            })
            .collect()
    }

    /// Lights that have burned out
    pub fn dead_count(&self) -> usize {
        self.lights
            .iter()
            .filter(|l| l.state() == State::Custom(LightState::Dead))
            .count()
    }

    pub fn board(&self) -> &Arc<Blackboard> {
        &self.board
    }

    pub fn strip(&self) -> &AmbientFlicker {
        &self.strip
    }

    pub fn lights(&self) -> &[SmartLight] {
        &self.lights
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn ticks(&self) -> u64 {
        self.clock.ticks()
    }
}
