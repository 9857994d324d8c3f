//! # Middleware
//!
//! Dispatch interceptors, composed in registration order: the first
//! middleware registered is the outermost wrapper. Both caller and
//! effect-originated dispatches pass through the chain.

use crate::store::StoreInner;
use redux_stream_types::{Action, ActionOrigin, StoreError, StoreState};

/// Continuation to the next middleware, or to the reducers.
pub type Next<'a> = &'a dyn Fn(Action) -> Result<Action, StoreError>;

/// A dispatch interceptor.
pub trait Middleware: Send + Sync {
    /// Handle `action`. Call `next` to continue; returning without calling it
    /// swallows the action.
    fn handle(
        &self,
        api: &MiddlewareApi<'_>,
        action: Action,
        next: Next<'_>,
    ) -> Result<Action, StoreError>;
}

/// Store access available to middleware.
pub struct MiddlewareApi<'a> {
    store: &'a StoreInner,
    origin: ActionOrigin,
}

impl<'a> MiddlewareApi<'a> {
    pub(crate) fn new(store: &'a StoreInner, origin: ActionOrigin) -> Self {
        Self { store, origin }
    }

    /// Current whole-store snapshot.
    #[must_use]
    pub fn get_state(&self) -> StoreState {
        self.store.container().snapshot()
    }

    /// Dispatch a new action from the top of the chain.
    pub fn dispatch(&self, action: Action) -> Result<Action, StoreError> {
        self.store.dispatch_with_origin(action, ActionOrigin::Dispatch)
    }

    /// Origin of the action being handled.
    #[must_use]
    pub fn origin(&self) -> ActionOrigin {
        self.origin
    }
}
