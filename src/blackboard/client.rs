use crate::agent::AgentId;
use crate::blackboard::{Blackboard, FactTuple, FactValue};
use std::sync::Arc;
use tracing::warn;

/// An agent's handle on the shared blackboard plus the key it registered under
#[derive(Clone)]
pub struct BlackboardClient {
    board: Arc<Blackboard>,
    key: Option<String>,
}

impl BlackboardClient {
    pub fn new(board: Arc<Blackboard>) -> Self {
        Self { board, key: None }
    }

    /// Register `fields` for `owner`, preferring `preferred_key`.
    ///
    /// Returns false when already registered or the key is taken.
    pub fn register(
        &mut self,
        owner: AgentId,
        fields: FactTuple,
        preferred_key: Option<&str>,
    ) -> bool {
        if self.key.is_some() {
            return false;
        }

        match self.board.register(Some(owner), fields, preferred_key) {
            Ok(key) => {
                self.key = Some(key);
                true
            }
            Err(e) => {
                warn!(owner = %owner, error = %e, "Blackboard registration failed");
                false
            }
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn board(&self) -> &Arc<Blackboard> {
        &self.board
    }

    /// Own tuple as of this call
    pub fn fields(&self) -> Option<FactTuple> {
        self.board.get_fields(self.key.as_deref()?)
    }

    /// Write one of the agent's own fields. False if unregistered or out of range.
    pub fn update(&self, index: usize, value: FactValue) -> bool {
        match self.key.as_deref() {
            Some(key) => self.board.update_field(key, index, value).is_ok(),
            None => false,
        }
    }

    /// Drop the agent's entry and forget the key
    pub fn unregister(&mut self) -> bool {
        match self.key.take() {
            Some(key) => self.board.unregister(&key),
            None => false,
        }
    }
}
