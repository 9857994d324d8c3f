//! # Redux-Stream Types Crate
//!
//! Single source of truth for the values that cross crate boundaries:
//!
//! - **Actions**: `Action` and the `ActionOrigin` tag carried on the bus.
//! - **State**: `State` (one module's slice) and `StoreState` (the composed snapshot).
//! - **Errors**: the configuration / reducer / effect taxonomy.
//!
//! ## Reserved Action Types
//!
//! Every module understands two reserved action types built from its name:
//!
//! ```text
//! "{module}/HYDRATE"      shallow-merge payload into state, flag `hydrated: true`
//! "{module}/CLEAR_STATE"  reset to the reducer's default
//! ```

pub mod action;
pub mod errors;
pub mod state;

pub use action::*;
pub use errors::*;
pub use state::*;
