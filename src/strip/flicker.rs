use crate::agent::Agent;
use crate::blackboard::{Blackboard, Breakage, FactValue};
use crate::fsm::{State, StateTag, TransitionError};
use crate::light::{FlickerParams, LightFacts, LightField, LightState};
use crate::services::Clock;
use crate::strip::Strip;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub const AMBIENT_FLICKER: &str = "ambient-flicker";

/// What the flicker rule needs from its caller
pub trait FlickerTarget {
    fn params(&self) -> &FlickerParams;

    /// Uniform sample in [0, 1)
    fn roll(&mut self) -> f64;

    fn induce_transition(
        &mut self,
        next: State<LightState>,
    ) -> Result<(), TransitionError<LightState>>;
}

/// Random draws for one evaluation, taken before any guard runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rolls {
    pub flicker: f64,
    pub brk: f64,
    pub stop: f64,
}

/// Outcome of the flicker rule for one lamp and one tick
#[derive(Debug, Clone, PartialEq)]
pub struct FlickerDecision {
    pub start: bool,
    /// Starting, and the lamp will die when this flicker ends
    pub will_break: bool,
    pub stop: bool,
    pub next: Option<LightState>,
    /// Still flickering with no transition this tick
    pub continuing: bool,
}

impl FlickerDecision {
    /// Evaluate every guard against one snapshot of the lamp's tuple.
    ///
    /// `vetoed` is true when some neighbor is flickering right now.
    pub fn evaluate(
        facts: &LightFacts,
        vetoed: bool,
        params: &FlickerParams,
        now: f64,
        rolls: &Rolls,
    ) -> Self {
        let on = facts.state == Some(State::Custom(LightState::On));
        let flickering = facts.state == Some(State::Custom(LightState::Flicker));

        let since_start = now - facts.start_flicker;
        let since_last = now - facts.last_flicker;
        let flickered_for = facts.last_flicker - facts.start_flicker;

        let cooling_down = since_start < params.flicker_cooldown;
        let overdue = since_last > params.max_last_flicker;
        let wants_flicker = rolls.flicker <= params.prob_of_flicker;

        let start = on && !vetoed && !cooling_down && (wants_flicker || overdue);
        let will_break = start && rolls.brk <= params.prob_break;

        let long_enough = flickered_for >= params.min_flicker_duration;
        let wants_stop = rolls.stop <= params.prob_of_stop_flicker;
        let overrun = since_start > params.flicker_duration;
        let stop = flickering && long_enough && (wants_stop || overrun);

        let next = if start {
            Some(LightState::Flicker)
        } else if stop {
            match facts.broken {
                Breakage::WillBreak => Some(LightState::Dead),
                Breakage::Intact => Some(LightState::On),
                Breakage::Broken => None,
            }
        } else {
            None
        };

        Self {
            start,
            will_break,
            stop,
            next,
            continuing: flickering && next.is_none(),
        }
    }
}

/// Ambient flicker rule for any [`FlickerTarget`], in practice
/// [`SmartLight`](crate::light::SmartLight)s.
///
/// Publishes `[transitions_induced]` under its own id.
pub struct AmbientFlicker {
    id: String,
    board: Arc<Blackboard>,
}

impl AmbientFlicker {
    pub fn new(board: Arc<Blackboard>) -> Self {
        Self::with_id(AMBIENT_FLICKER, board)
    }

    pub fn with_id(id: impl Into<String>, board: Arc<Blackboard>) -> Self {
        let strip = Self {
            id: id.into(),
            board,
        };
        if !strip.register_facts(&strip.board, vec![FactValue::Int(0)]) {
            warn!(strip = %strip.id, "Strip id already on the blackboard");
        }
        strip
    }

    /// Transitions this strip has induced so far
    pub fn transitions_induced(&self) -> i64 {
        self.board
            .get_field(&self.id, 0)
            .and_then(|v| v.as_int())
            .unwrap_or(0)
    }

    fn neighbor_flickering(&self, key: &str) -> bool {
        self.board
            .get_field(key, LightField::State.index())
            .and_then(|v| v.as_int())
            == Some(LightState::Flicker.code())
    }

    fn write(&self, key: &str, field: LightField, value: FactValue) {
        if let Err(e) = self.board.update_field(key, field.index(), value) {
            debug!(strip = %self.id, key = %key, error = %e, "Fact write skipped");
        }
    }

    fn apply(
        &self,
        light: &mut dyn FlickerTarget,
        key: &str,
        facts: &LightFacts,
        decision: &FlickerDecision,
        clock: &dyn Clock,
    ) {
        let now = clock.now();

        let Some(next) = decision.next else {
            if decision.continuing {
                // Deferred: only after the decision is final
                self.write(
                    key,
                    LightField::LastFlicker,
                    FactValue::Float(facts.last_flicker + clock.delta()),
                );
            }
            return;
        };

        if decision.will_break {
            self.write(key, LightField::Broken, Breakage::WillBreak.into());
        }
        if next == LightState::Dead {
            self.write(key, LightField::Broken, Breakage::Broken.into());
        }

        self.write(key, LightField::State, FactValue::Int(next.code()));

        if next == LightState::Flicker {
            self.write(key, LightField::StartFlicker, FactValue::Float(now));
            self.write(key, LightField::LastFlicker, FactValue::Float(now));
        }

        match light.induce_transition(next.into()) {
            Ok(()) => {
                debug!(strip = %self.id, key = %key, next = ?next, "Induced transition");
                let count = self.transitions_induced() + 1;
                if self.board.update_field(&self.id, 0, FactValue::Int(count)).is_err() {
                    trace!(strip = %self.id, "Transition counter unavailable");
                }
            }
            Err(e) => debug!(strip = %self.id, key = %key, error = %e, "Transition rejected"),
        }
    }
}

impl Strip for AmbientFlicker {
    fn id(&self) -> &str {
        &self.id
    }

    fn action(&self, caller: &mut dyn Agent, clock: &dyn Clock) {
        let Some(key) = caller.key().map(str::to_string) else {
            trace!(strip = %self.id, agent = %caller.name(), "Caller not registered");
            return;
        };

        let Some(light) = caller.flicker_target() else {
            trace!(strip = %self.id, key = %key, "Caller cannot flicker");
            return;
        };

        let Some(facts) = self.board.with_fields(&key, LightFacts::from_fields).flatten() else {
            debug!(strip = %self.id, key = %key, "No readable facts for caller");
            return;
        };

        let vetoed = facts.neighbors.iter().any(|n| self.neighbor_flickering(n));
        let rolls = Rolls {
            flicker: light.roll(),
            brk: light.roll(),
            stop: light.roll(),
        };

        let now = clock.now();
        let decision = FlickerDecision::evaluate(&facts, vetoed, light.params(), now, &rolls);
        self.apply(light, &key, &facts, &decision, clock);
    }
}
