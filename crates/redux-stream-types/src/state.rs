//! # State Snapshots
//!
//! `State` is one module's reduced slice. It is reference-counted so that
//! "unchanged" can be decided by pointer identity instead of deep comparison.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One module's state slice.
pub type State = Arc<Value>;

/// Wrap a JSON value as a fresh state reference.
#[must_use]
pub fn state(value: Value) -> State {
    Arc::new(value)
}

/// Composed whole-store snapshot, keyed by module name.
///
/// Cloning is cheap: only the per-module references are copied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    modules: BTreeMap<String, State>,
}

impl StoreState {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of one module.
    #[must_use]
    pub fn get(&self, module: &str) -> Option<&State> {
        self.modules.get(module)
    }

    /// Replace one module's state, returning the previous reference.
    pub fn insert(&mut self, module: impl Into<String>, state: State) -> Option<State> {
        self.modules.insert(module.into(), state)
    }

    /// Registered module names, in key order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Iterate over `(module, state)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &State)> {
        self.modules.iter().map(|(name, state)| (name.as_str(), state))
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the snapshot holds no modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Render as a JSON object `{ module: state, ... }`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .modules
            .iter()
            .map(|(name, state)| (name.clone(), state.as_ref().clone()))
            .collect();
        Value::Object(map)
    }
}
