//! # Bus Messages
//!
//! What flows through the bus and how subscribers select from it.

use redux_stream_types::{Action, ActionOrigin};
use serde::{Deserialize, Serialize};

/// An action as published on the bus, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// The published action.
    pub action: Action,
    /// Caller dispatch or effect feedback.
    pub origin: ActionOrigin,
    /// Publish sequence number, starting at 1.
    pub sequence: u64,
}

impl BusMessage {
    /// Whether an effect produced this message.
    #[must_use]
    pub fn is_effect(&self) -> bool {
        self.origin == ActionOrigin::Effect
    }
}

/// Filter for subscribing to specific actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionFilter {
    /// Action types to include. Empty means all types.
    pub types: Vec<String>,
    /// Origins to include. Empty means all origins.
    pub origins: Vec<ActionOrigin>,
}

impl ActionFilter {
    /// Create a filter that accepts all actions.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific action types.
    #[must_use]
    pub fn types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
            origins: Vec::new(),
        }
    }

    /// Create a filter accepting only effect-originated actions.
    #[must_use]
    pub fn effects_only() -> Self {
        Self {
            types: Vec::new(),
            origins: vec![ActionOrigin::Effect],
        }
    }

    /// Narrow this filter to the given action types, keeping its origins.
    #[must_use]
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        let type_match =
            self.types.is_empty() || self.types.iter().any(|t| message.action.is(t));

        let origin_match = self.origins.is_empty() || self.origins.contains(&message.origin);

        type_match && origin_match
    }

    /// Stable key used for subscription bookkeeping.
    pub(crate) fn key(&self) -> String {
        format!("{:?}|{:?}", self.types, self.origins)
    }
}
