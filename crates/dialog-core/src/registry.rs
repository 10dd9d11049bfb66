//! Call session registry
//!
//! Shared state between the receive loop, timer tasks and API callers.
//! Each call sits behind its own mutex; the map itself is a `DashMap` so
//! insert, lookup and removal are atomic per key. Guards must never be held
//! across a send.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::dialog::Call;
use crate::errors::{DialogError, DialogResult};

pub type SharedCall = Arc<Mutex<Call>>;

/// Calls by Call-ID
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: DashMap<String, SharedCall>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new call; fails if the Call-ID is already present
    pub fn insert(&self, call: Call) -> DialogResult<SharedCall> {
        match self.calls.entry(call.call_id.clone()) {
            Entry::Occupied(_) => Err(DialogError::DuplicateCall(call.call_id)),
            Entry::Vacant(slot) => {
                let shared = Arc::new(Mutex::new(call));
                slot.insert(shared.clone());
                Ok(shared)
            }
        }
    }

    pub fn get(&self, call_id: &str) -> Option<SharedCall> {
        self.calls.get(call_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.calls.contains_key(call_id)
    }

    /// Remove a call; removing an absent call is a no-op returning `None`
    pub fn remove(&self, call_id: &str) -> Option<SharedCall> {
        self.calls.remove(call_id).map(|(_, call)| call)
    }

    pub fn call_ids(&self) -> Vec<String> {
        self.calls.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
