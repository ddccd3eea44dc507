// Shared tuple-space agents coordinate through

mod board;
mod client;
mod fact;

pub use board::{Blackboard, BlackboardError};
pub use client::BlackboardClient;
pub use fact::{Breakage, BoardEntry, FactTuple, FactUpdate, FactValue};
