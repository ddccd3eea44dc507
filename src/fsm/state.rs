use std::fmt;
use std::hash::Hash;

/// Agent-specific state enumeration plugged into a [`super::StateMachine`]
pub trait StateTag: Copy + Eq + Hash + fmt::Debug + Send + 'static {
    /// Integer published on the blackboard. Must be positive; -1 and 0
    /// belong to BAD and INIT.
    fn code(self) -> i64;

    fn from_code(code: i64) -> Option<Self>;
}

/// A machine state: the two universal states plus the agent's own
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State<S> {
    /// Entered on an invalid transition; only leads back to INIT
    Bad,
    /// Default start
    Init,
    Custom(S),
}

pub const BAD_STATE: i64 = -1;
pub const INIT_STATE: i64 = 0;

impl<S: StateTag> State<S> {
    pub fn code(self) -> i64 {
        match self {
            State::Bad => BAD_STATE,
            State::Init => INIT_STATE,
            State::Custom(s) => s.code(),
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            BAD_STATE => Some(State::Bad),
            INIT_STATE => Some(State::Init),
            other => S::from_code(other).map(State::Custom),
        }
    }

    pub fn custom(self) -> Option<S> {
        match self {
            State::Custom(s) => Some(s),
            _ => None,
        }
    }
}

impl<S: StateTag> fmt::Display for State<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Bad => write!(f, "BAD"),
            State::Init => write!(f, "INIT"),
            State::Custom(s) => write!(f, "{:?}", s),
        }
    }
}

impl<S: StateTag> From<S> for State<S> {
    fn from(s: S) -> Self {
        State::Custom(s)
    }
}
