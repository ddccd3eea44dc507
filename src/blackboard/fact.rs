use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::agent::AgentId;

/// Single positional field of a fact tuple
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// Key of another blackboard entry (lookup only, no ownership)
    Ref(String),
}

/// Ordered fields describing one agent's externally visible state
pub type FactTuple = Vec<FactValue>;

impl FactValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FactValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Ints widen to floats so timestamps written either way read back.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FactValue::Float(v) => Some(*v),
            FactValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FactValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref_key(&self) -> Option<&str> {
        match self {
            FactValue::Ref(v) => Some(v),
            _ => None,
        }
    }
}

/// Canonical string encoding, used at the logging boundary
impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Int(v) => write!(f, "{}", v),
            FactValue::Float(v) => write!(f, "{}", v),
            FactValue::Bool(v) => write!(f, "{}", v),
            FactValue::Text(v) => write!(f, "{}", v),
            FactValue::Ref(v) => write!(f, "@{}", v),
        }
    }
}

impl From<Breakage> for FactValue {
    fn from(b: Breakage) -> Self {
        FactValue::Text(b.as_str().to_string())
    }
}

/// Tri-state broken flag stored in a light's BROKEN field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Breakage {
    Intact,
    WillBreak,
    Broken,
}

impl Breakage {
    pub fn as_str(self) -> &'static str {
        match self {
            Breakage::Intact => "false",
            Breakage::WillBreak => "will break",
            Breakage::Broken => "true",
        }
    }

    pub fn from_fact(value: &FactValue) -> Option<Self> {
        value.as_text().and_then(|s| s.parse().ok())
    }
}

impl FromStr for Breakage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "false" => Ok(Breakage::Intact),
            "will break" => Ok(Breakage::WillBreak),
            "true" => Ok(Breakage::Broken),
            _ => Err(()),
        }
    }
}

/// One registered key: its optional owner and its live fact tuple
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoardEntry {
    pub key: String,

    /// Agent that registered the key, if any
    pub owner: Option<AgentId>,

    pub fields: FactTuple,

    /// Last mutation timestamp
    pub last_updated: DateTime<Utc>,
}

/// Field change broadcast to subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactUpdate {
    pub key: String,
    pub index: usize,
    pub old_value: Option<FactValue>,
    /// None when the field was removed
    pub new_value: Option<FactValue>,
    pub timestamp: DateTime<Utc>,
}
