//! # Module Reducer Adapter
//!
//! Higher-order reducer giving every module built-in handling of its two
//! reserved action types:
//!
//! - `"{module}/HYDRATE"`: shallow-merge the payload object into the current
//!   state and set `hydrated: true`.
//! - `"{module}/CLEAR_STATE"`: run the inner reducer with no state, i.e. reset
//!   to its default exactly as on first initialization.
//!
//! Everything else is delegated unchanged.

use crate::module::{reducer, Reducer};
use redux_stream_types::{clear_state_action_type, hydrate_action_type, State};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Field set on every hydrated state.
pub const HYDRATED_FIELD: &str = "hydrated";

/// Wrap `inner` with hydrate/clear-state handling for `module`.
pub fn module_reducer(module: &str, inner: Reducer) -> Reducer {
    let hydrate_type = hydrate_action_type(module);
    let clear_type = clear_state_action_type(module);

    reducer(move |state, action| {
        if action.is(&hydrate_type) {
            Ok(hydrate(state, action.payload()))
        } else if action.is(&clear_type) {
            inner(None, action)
        } else {
            inner(state, action)
        }
    })
}

/// Non-object states and payloads contribute no fields to the merge.
fn hydrate(state: Option<&State>, payload: Option<&Value>) -> State {
    let mut merged = match state.map(|s| &**s) {
        Some(Value::Object(fields)) => fields.clone(),
        _ => Map::new(),
    };

    if let Some(Value::Object(patch)) = payload {
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
    }

    merged.insert(HYDRATED_FIELD.to_string(), Value::Bool(true));
    Arc::new(Value::Object(merged))
}
