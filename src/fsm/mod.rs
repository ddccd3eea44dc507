// Generic finite state machine with induced transitions and bad-state recovery

mod machine;
mod state;

pub use machine::{routine, InitSnapshot, Routine, StateMachine, TransitionError};
pub use state::{State, StateTag, BAD_STATE, INIT_STATE};
