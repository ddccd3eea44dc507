use crate::strip::FlickerTarget;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use uuid::Uuid;

/// Stable identity of an agent, independent of its blackboard key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Key used when the agent registers without choosing one
    pub fn derived_key(&self) -> String {
        format!("agent_{}", self.0.simple())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything a strip can be invoked on.
///
/// Strips look up the capability they need (a `*_target` lookup, or
/// `as_any_mut` for concrete types) and do nothing when the caller does
/// not provide it.
pub trait Agent: Send {
    fn id(&self) -> AgentId;

    fn name(&self) -> &str;

    /// Blackboard key, once registered
    fn key(&self) -> Option<&str>;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn flicker_target(&mut self) -> Option<&mut dyn FlickerTarget> {
        None
    }
}
