//! Strips: named rules evaluated against a caller's blackboard facts.
//!
//! A strip is shared by every agent that uses it. Each tick the agent hands
//! itself to [`Strip::action`]; the strip reads the agent's tuple, decides,
//! writes facts back and may induce a transition on the agent.

mod flicker;

pub use flicker::{AmbientFlicker, FlickerDecision, FlickerTarget, Rolls, AMBIENT_FLICKER};

use crate::agent::Agent;
use crate::blackboard::{Blackboard, FactTuple};
use crate::services::Clock;

pub trait Strip: Send + Sync {
    fn id(&self) -> &str;

    /// Evaluate the rule for `caller`. Called once per caller per tick;
    /// callers lacking what the rule needs are left alone.
    fn action(&self, caller: &mut dyn Agent, clock: &dyn Clock);

    /// Publish facts under the strip's own id. True if the id was accepted.
    fn register_facts(&self, board: &Blackboard, values: FactTuple) -> bool {
        match board.register(None, values, Some(self.id())) {
            Ok(key) => key == self.id(),
            Err(_) => false,
        }
    }
}
