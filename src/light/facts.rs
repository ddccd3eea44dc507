use crate::blackboard::{Breakage, FactTuple, FactValue};
use crate::fsm::State;
use crate::light::LightState;

/// Positions in a lamp's fact tuple. Neighbor keys follow from index 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightField {
    State = 0,
    StartFlicker = 1,
    LastFlicker = 2,
    Broken = 3,
}

impl LightField {
    pub const NEIGHBORS: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Decoded lamp tuple
#[derive(Debug, Clone, PartialEq)]
pub struct LightFacts {
    /// None if the STATE field holds an unknown code
    pub state: Option<State<LightState>>,
    pub start_flicker: f64,
    pub last_flicker: f64,
    pub broken: Breakage,
    pub neighbors: Vec<String>,
}

impl LightFacts {
    /// Decode a tuple. None if it is too short or a field has the wrong shape.
    pub fn from_fields(fields: &[FactValue]) -> Option<Self> {
        if fields.len() < LightField::NEIGHBORS {
            return None;
        }

        let code = fields[LightField::State.index()].as_int()?;
        let start_flicker = fields[LightField::StartFlicker.index()].as_float()?;
        let last_flicker = fields[LightField::LastFlicker.index()].as_float()?;
        let broken = Breakage::from_fact(&fields[LightField::Broken.index()])?;

        // Non-reference trailing fields are ad hoc facts, not neighbors
        let neighbors = fields[LightField::NEIGHBORS..]
            .iter()
            .filter_map(|f| f.as_ref_key().map(str::to_string))
            .collect();

        Some(Self {
            state: State::from_code(code),
            start_flicker,
            last_flicker,
            broken,
            neighbors,
        })
    }

    pub fn to_fields(&self) -> FactTuple {
        let mut fields = vec![
            FactValue::Int(self.state.map(|s| s.code()).unwrap_or(crate::fsm::BAD_STATE)),
            FactValue::Float(self.start_flicker),
            FactValue::Float(self.last_flicker),
            FactValue::from(self.broken),
        ];
        fields.extend(self.neighbors.iter().cloned().map(FactValue::Ref));
        fields
    }
}
