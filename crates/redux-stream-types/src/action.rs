//! # Actions
//!
//! Typed messages describing an intended state transition.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Suffix of the reserved hydrate action type.
pub const HYDRATE_SUFFIX: &str = "HYDRATE";

/// Suffix of the reserved clear-state action type.
pub const CLEAR_STATE_SUFFIX: &str = "CLEAR_STATE";

/// Action type dispatched once per module to compute its initial state.
pub const INIT_ACTION_TYPE: &str = "@@redux-stream/INIT";

/// A dispatched action.
///
/// Serializes as `{ "type": ..., "payload": ... }`; `payload` is omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Dispatch discriminator.
    #[serde(rename = "type")]
    pub action_type: String,

    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Action {
    /// Create an action without a payload.
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: None,
        }
    }

    /// Create an action carrying a payload.
    #[must_use]
    pub fn with_payload(action_type: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Some(payload.into()),
        }
    }

    /// The dispatch discriminator.
    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// The payload, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Check the discriminator.
    #[must_use]
    pub fn is(&self, action_type: &str) -> bool {
        self.action_type == action_type
    }
}

/// Where a published action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionOrigin {
    /// Dispatched by a caller of the store.
    Dispatch,
    /// Emitted by an effect stream and fed back into dispatch.
    Effect,
}

/// `"{module}/HYDRATE"`.
#[must_use]
pub fn hydrate_action_type(module: &str) -> String {
    format!("{module}/{HYDRATE_SUFFIX}")
}

/// `"{module}/CLEAR_STATE"`.
#[must_use]
pub fn clear_state_action_type(module: &str) -> String {
    format!("{module}/{CLEAR_STATE_SUFFIX}")
}
