use crate::agent::AgentId;
use crate::blackboard::fact::{BoardEntry, FactTuple, FactUpdate, FactValue};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Blackboard operation errors
#[derive(Debug, Clone, PartialEq)]
pub enum BlackboardError {
    /// Key already bound to another entry
    KeyConflict(String),
    /// Registration supplied neither an owner nor a key
    NoIdentity,
    NotFound(String),
    /// Positional access outside the stored tuple
    InvalidRange { index: usize, len: usize },
}

impl fmt::Display for BlackboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlackboardError::KeyConflict(key) => write!(f, "key '{}' is already registered", key),
            BlackboardError::NoIdentity => {
                write!(f, "registration needs an owner or an explicit key")
            }
            BlackboardError::NotFound(key) => write!(f, "key '{}' is not registered", key),
            BlackboardError::InvalidRange { index, len } => {
                write!(f, "index {} out of range for tuple of length {}", index, len)
            }
        }
    }
}

impl std::error::Error for BlackboardError {}

/// Shared keyed store of fact tuples.
///
/// Each call locks only the shard holding its key, so a reader never sees
/// a half-written field. Nothing spans calls: two updates to the same key
/// are two independent writes (last write wins).
pub struct Blackboard {
    entries: DashMap<String, BoardEntry>,

    /// Broadcast channel for field changes
    update_tx: broadcast::Sender<FactUpdate>,
}

impl Blackboard {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(1000);

        Self {
            entries: DashMap::new(),
            update_tx,
        }
    }

    /// Bind a fact tuple to a key.
    ///
    /// With an explicit key the key is used as-is and must be free. Without
    /// one the key is derived from the owner's identity, which must also be
    /// free. Returns the bound key.
    pub fn register(
        &self,
        owner: Option<AgentId>,
        fields: FactTuple,
        key: Option<&str>,
    ) -> Result<String, BlackboardError> {
        let key = match (key, owner) {
            (Some(k), _) => k.to_string(),
            (None, Some(owner)) => owner.derived_key(),
            (None, None) => return Err(BlackboardError::NoIdentity),
        };

        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => {
                warn!(key = %key, "Registration rejected, key already bound");
                Err(BlackboardError::KeyConflict(key))
            }
            Entry::Vacant(slot) => {
                let len = fields.len();
                slot.insert(BoardEntry {
                    key: key.clone(),
                    owner,
                    fields,
                    last_updated: Utc::now(),
                });
                info!(key = %key, fields = len, "Registered on blackboard");
                Ok(key)
            }
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Copy of the tuple as of this call
    pub fn get_fields(&self, key: &str) -> Option<FactTuple> {
        self.entries.get(key).map(|e| e.fields.clone())
    }

    pub fn get_field(&self, key: &str, index: usize) -> Option<FactValue> {
        self.entries.get(key)?.fields.get(index).cloned()
    }

    /// Read the tuple in place without copying it
    pub fn with_fields<R>(&self, key: &str, f: impl FnOnce(&[FactValue]) -> R) -> Option<R> {
        self.entries.get(key).map(|e| f(&e.fields))
    }

    /// Overwrite one field in place. The tuple never grows here.
    pub fn update_field(
        &self,
        key: &str,
        index: usize,
        value: FactValue,
    ) -> Result<FactUpdate, BlackboardError> {
        let now = Utc::now();

        let old_value = {
            let mut entry = self
                .entries
                .get_mut(key)
                .ok_or_else(|| BlackboardError::NotFound(key.to_string()))?;
            let len = entry.fields.len();
            let slot = entry
                .fields
                .get_mut(index)
                .ok_or(BlackboardError::InvalidRange { index, len })?;
            let old = std::mem::replace(slot, value.clone());
            entry.last_updated = now;
            old
        };

        let update = FactUpdate {
            key: key.to_string(),
            index,
            old_value: Some(old_value),
            new_value: Some(value),
            timestamp: now,
        };
        let _ = self.update_tx.send(update.clone());

        Ok(update)
    }

    /// Extend the tuple. Returns its new length.
    pub fn append_fields(
        &self,
        key: &str,
        values: impl IntoIterator<Item = FactValue>,
    ) -> Result<usize, BlackboardError> {
        let now = Utc::now();

        let (first, appended) = {
            let mut entry = self
                .entries
                .get_mut(key)
                .ok_or_else(|| BlackboardError::NotFound(key.to_string()))?;
            let first = entry.fields.len();
            entry.fields.extend(values);
            entry.last_updated = now;
            (first, entry.fields[first..].to_vec())
        };

        for (offset, value) in appended.iter().enumerate() {
            let _ = self.update_tx.send(FactUpdate {
                key: key.to_string(),
                index: first + offset,
                old_value: None,
                new_value: Some(value.clone()),
                timestamp: now,
            });
        }

        Ok(first + appended.len())
    }

    /// Delete one field, shifting later fields down by one.
    ///
    /// Indices past `index` change meaning afterwards; overwrite with a
    /// sentinel through `update_field` when positions must stay fixed.
    pub fn remove_field_at(&self, key: &str, index: usize) -> Result<FactValue, BlackboardError> {
        let now = Utc::now();

        let removed = {
            let mut entry = self
                .entries
                .get_mut(key)
                .ok_or_else(|| BlackboardError::NotFound(key.to_string()))?;
            let len = entry.fields.len();
            if index >= len {
                return Err(BlackboardError::InvalidRange { index, len });
            }
            entry.last_updated = now;
            entry.fields.remove(index)
        };

        let _ = self.update_tx.send(FactUpdate {
            key: key.to_string(),
            index,
            old_value: Some(removed.clone()),
            new_value: None,
            timestamp: now,
        });

        Ok(removed)
    }

    /// Compare `fields[start..end]` against `values`.
    ///
    /// `end = None` compares through the end of the tuple. False when the key
    /// is absent, the range is empty or past the tuple, or lengths differ.
    pub fn matches(
        &self,
        key: &str,
        values: &[FactValue],
        start: usize,
        end: Option<usize>,
    ) -> bool {
        self.with_fields(key, |fields| {
            let end = end.unwrap_or(fields.len());
            if end > fields.len() || end <= start {
                return false;
            }
            fields[start..end] == *values
        })
        .unwrap_or(false)
    }

    /// Remove a key entirely. False if it was not registered.
    pub fn unregister(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            info!(key = %key, "Unregistered from blackboard");
        } else {
            debug!(key = %key, "Unregister of unknown key ignored");
        }
        removed
    }

    pub fn owner_of(&self, key: &str) -> Option<AgentId> {
        self.entries.get(key).and_then(|e| e.owner)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, ordered by key
    pub fn snapshot(&self) -> Vec<BoardEntry> {
        let mut entries: Vec<BoardEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Subscribe to field changes
    pub fn subscribe(&self) -> broadcast::Receiver<FactUpdate> {
        self.update_tx.subscribe()
    }
}

impl Default for Blackboard {
    fn default() -> Self {
        Self::new()
    }
}
