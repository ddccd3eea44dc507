use anyhow::{Context, Result};
use serde::Deserialize;

use crate::light::FlickerParams;
use crate::services::Transform;
use crate::strip::AMBIENT_FLICKER;

/// Complete simulation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AmbientConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Defaults for every light without its own `flicker` table
    #[serde(default)]
    pub flicker: FlickerParams,
    #[serde(default = "default_lights")]
    pub lights: Vec<LightSpec>,
}

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Fixed tick length (milliseconds)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Ticks to run before exiting
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Seed for the random sources; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Pace ticks against the wall clock instead of running flat out
    #[serde(default)]
    pub realtime: bool,
    /// Strip every light runs each tick
    #[serde(default = "default_strip")]
    pub strip: String,
}

fn default_tick_ms() -> u64 {
    16
}

fn default_ticks() -> u64 {
    600
}

fn default_strip() -> String {
    AMBIENT_FLICKER.to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            ticks: default_ticks(),
            seed: None,
            realtime: false,
            strip: default_strip(),
        }
    }
}

impl SimulationConfig {
    /// Override from env vars; unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("AMBIENT_TICKS") {
            if let Ok(n) = v.parse::<u64>() {
                self.ticks = n;
            }
        }
        if let Ok(v) = std::env::var("AMBIENT_TICK_MS") {
            if let Ok(n) = v.parse::<u64>() {
                self.tick_ms = n;
            }
        }
        if let Ok(v) = std::env::var("AMBIENT_SEED") {
            if let Ok(n) = v.parse::<u64>() {
                self.seed = Some(n);
            }
        }
        if let Ok(v) = std::env::var("AMBIENT_REALTIME") {
            if let Ok(b) = v.parse::<bool>() {
                self.realtime = b;
            }
        }
    }

    /// Tick length in seconds
    pub fn tick_seconds(&self) -> f64 {
        self.tick_ms as f64 / 1000.0
    }
}

/// One lamp in the scene
#[derive(Debug, Clone, Deserialize)]
pub struct LightSpec {
    /// Also the lamp's blackboard key
    pub name: String,
    #[serde(default)]
    pub neighbors: Vec<String>,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "default_orientation")]
    pub orientation: [f32; 4],
    /// Replaces the global flicker defaults for this lamp
    #[serde(default)]
    pub flicker: Option<FlickerParams>,
}

fn default_orientation() -> [f32; 4] {
    Transform::default().orientation
}

impl LightSpec {
    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            orientation: self.orientation,
        }
    }
}

/// A corridor of three lamps, each next to its neighbors
fn default_lights() -> Vec<LightSpec> {
    let names = ["hall-1", "hall-2", "hall-3"];
    names
        .iter()
        .enumerate()
        .map(|(i, name)| LightSpec {
            name: name.to_string(),
            neighbors: names
                .iter()
                .enumerate()
                .filter(|(j, _)| i.abs_diff(*j) == 1)
                .map(|(_, n)| n.to_string())
                .collect(),
            position: [i as f32 * 4.0, 3.0, 0.0],
            orientation: default_orientation(),
            flicker: None,
        })
        .collect()
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            flicker: FlickerParams::default(),
            lights: default_lights(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<AmbientConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path))?;
    let config: AmbientConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config at {}", path))?;
    Ok(config)
}
