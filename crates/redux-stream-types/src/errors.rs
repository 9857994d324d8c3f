//! # Error Types
//!
//! Configuration errors fail fast at the call site, reducer errors propagate
//! out of `dispatch`, effect errors are fatal only at store construction.

use thiserror::Error;

/// Errors surfaced by the store facade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A module name not present in the module map was referenced.
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// The same module name was registered twice.
    #[error("Duplicate module: {0}")]
    DuplicateModule(String),

    /// A module reducer failed; nothing was committed.
    #[error("Reducer for module '{module}' failed: {source}")]
    Reducer {
        module: String,
        #[source]
        source: ReducerError,
    },

    /// A module's effects producer failed while the store was being built.
    #[error("Effects for module '{module}' failed to start: {source}")]
    EffectSetup {
        module: String,
        #[source]
        source: EffectError,
    },

    /// `dispatch` was called from inside a reducer.
    #[error("Reentrant dispatch of '{action_type}' rejected: reduction already in progress")]
    ReentrantDispatch { action_type: String },

    /// Effects were declared but no Tokio runtime is running.
    #[error("No Tokio runtime available to schedule effects")]
    NoRuntime,

    /// The store was shut down.
    #[error("Store has been shut down")]
    ShutDown,

    /// Invalid store configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Failure raised by a module reducer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ReducerError(pub String);

impl ReducerError {
    /// Create a reducer error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure raised by an effects producer or an effect stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct EffectError(pub String);

impl EffectError {
    /// Create an effect error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The action bus needs room for at least one message.
    #[error("Bus capacity must be greater than zero")]
    ZeroBusCapacity,

    /// Preloaded state must be a JSON object keyed by module name.
    #[error("Preloaded state must be an object keyed by module name")]
    InvalidPreloadedState,

    /// An environment variable could not be parsed.
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}
