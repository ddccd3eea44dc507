// Breakable flickering lamp built on the state machine and the flicker strip

mod agent;
mod facts;
mod routines;

pub use agent::{LightHost, SmartLight};
pub use facts::{LightFacts, LightField};

use crate::fsm::StateTag;
use serde::{Deserialize, Serialize};

/// Lamp states on top of the universal BAD/INIT
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightState {
    On,
    Flicker,
    /// Terminal; the lamp stays off
    Dead,
}

impl StateTag for LightState {
    fn code(self) -> i64 {
        match self {
            LightState::On => 1,
            LightState::Flicker => 2,
            LightState::Dead => 3,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(LightState::On),
            2 => Some(LightState::Flicker),
            3 => Some(LightState::Dead),
            _ => None,
        }
    }
}

/// Tuning for the flicker rule and the flicker routine. Times in seconds,
/// probabilities are per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlickerParams {
    /// Flicker regardless of the roll once this long without one
    #[serde(default = "default_max_last_flicker")]
    pub max_last_flicker: f64,
    /// Stop regardless of the roll once flickering this long
    #[serde(default = "default_flicker_duration")]
    pub flicker_duration: f64,
    /// Upper bound between two lamp toggles while flickering
    #[serde(default = "default_max_flicker_wait")]
    pub max_flicker_wait: f64,
    /// No new flicker this soon after the previous one started
    #[serde(default = "default_flicker_cooldown")]
    pub flicker_cooldown: f64,
    #[serde(default = "default_min_flicker_duration")]
    pub min_flicker_duration: f64,
    #[serde(default = "default_prob_of_flicker")]
    pub prob_of_flicker: f64,
    #[serde(default = "default_prob_of_stop_flicker")]
    pub prob_of_stop_flicker: f64,
    /// Chance a starting flicker ends with the lamp dead
    #[serde(default = "default_prob_break")]
    pub prob_break: f64,
}

fn default_max_last_flicker() -> f64 {
    5.0
}

fn default_flicker_duration() -> f64 {
    2.0
}

fn default_max_flicker_wait() -> f64 {
    0.75
}

fn default_flicker_cooldown() -> f64 {
    3.0
}

fn default_min_flicker_duration() -> f64 {
    1.0
}

fn default_prob_of_flicker() -> f64 {
    0.2
}

fn default_prob_of_stop_flicker() -> f64 {
    0.1
}

fn default_prob_break() -> f64 {
    0.05
}

impl Default for FlickerParams {
    fn default() -> Self {
        Self {
            max_last_flicker: default_max_last_flicker(),
            flicker_duration: default_flicker_duration(),
            max_flicker_wait: default_max_flicker_wait(),
            flicker_cooldown: default_flicker_cooldown(),
            min_flicker_duration: default_min_flicker_duration(),
            prob_of_flicker: default_prob_of_flicker(),
            prob_of_stop_flicker: default_prob_of_stop_flicker(),
            prob_break: default_prob_break(),
        }
    }
}

#[cfg(test)]
mod tests;
