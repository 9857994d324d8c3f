//! # Redux-Stream Bus - Multicast Channel for Dispatched Actions
//!
//! Every action the store reduces is republished here so effects can react
//! to it. Two views exist over the same channel:
//!
//! ```text
//!   dispatch()  ──┐
//!                 ├──► ActionBus ──► dispatch$  (every action)
//!   effect emit ──┘         │
//!                           └──────► effects$   (origin == Effect only)
//! ```
//!
//! Routing is done by `ActionFilter` predicates: a subscriber only ever
//! observes actions its filter accepts, so unrelated effect logic never runs.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod operators;
pub mod publisher;
pub mod subscriber;

pub use events::{ActionFilter, BusMessage};
pub use operators::{ActionStreamExt, Effect, PayloadStreamExt, TryActionStreamExt};
pub use publisher::{ActionBus, ActionPublisher};
pub use subscriber::{ActionSource, ActionStream, ActionSubscription, SubscriptionError};

/// Backlog per subscriber at which the bus logs a warning. Nothing is dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
