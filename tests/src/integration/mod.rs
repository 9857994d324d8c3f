//! # Integration Scenarios
//!
//! End-to-end behavior of a store built from several modules, observed only
//! through the public API.

pub mod composition;
