//! # State Container
//!
//! Holds the composed module states. The store is the only writer; the
//! registry and effect contexts read consistent snapshots through it.

use parking_lot::RwLock;
use redux_stream_types::{State, StoreState};

/// Owner of the live module-state map.
pub struct StateContainer {
    state: RwLock<StoreState>,
}

impl StateContainer {
    pub(crate) fn new(initial: StoreState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    /// Synchronous snapshot of every module's current state.
    #[must_use]
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Current state of one module, or `None` if it is not registered.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<State> {
        self.state.read().get(name).cloned()
    }

    /// Whether `name` is a registered module.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().get(name).is_some()
    }

    pub(crate) fn commit(&self, next: StoreState) {
        *self.state.write() = next;
    }
}
