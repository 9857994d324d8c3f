//! # Redux-Stream
//!
//! A reducer-based state container where every module's state slice is also
//! a push-based, replay-latest stream, and where effects observing the
//! action bus can dispatch new actions back into the store.
//!
//! ## Wiring
//!
//! ```text
//!             dispatch(action)
//!                   │
//!            ┌──────▼──────┐
//!            │ middleware  │  (first registered = outermost)
//!            └──────┬──────┘
//!                   ▼
//!    module reducers (synchronous, all-or-nothing commit)
//!                   │
//!        ┌──────────┼─────────────┐
//!        ▼          ▼             ▼
//!   state streams  listeners   ActionBus ──► effects ──► feedback queue
//!   (changed only)                                          │
//!        ▲                                                  │
//!        └──────────── dispatch(origin = Effect) ◄──────────┘
//!                       (later scheduler turn)
//! ```
//!
//! ## Guarantees
//!
//! - When `dispatch` returns, `get_state()` and every state-stream subscriber
//!   already reflect the reduction.
//! - A module's stream emits only when its state reference changes.
//! - Effect pipelines run inside the dispatch that triggered them; their
//!   output is never reduced inline with it.
//! - Dispatching from a listener or state-stream callback reduces the new
//!   action after the current notification pass; dispatching from a reducer
//!   is an error.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapter;
pub mod config;
pub mod container;
pub mod effects;
pub mod middleware;
pub mod module;
pub mod registry;
pub mod store;

pub use adapter::module_reducer;
pub use config::StoreConfig;
pub use container::StateContainer;
pub use effects::EffectContext;
pub use middleware::{Middleware, MiddlewareApi, Next};
pub use module::{combine_effects, effects_fn, reducer, CombinedEffects, EffectsFn, ModuleDef, ModuleMap, Reducer};
pub use registry::{StateRegistry, StateStream, StateWatch, Subscription};
pub use store::{create_enhanced_store, Store, StoreBuilder};

pub use redux_stream_bus::{
    ActionBus, ActionFilter, ActionSource, ActionStream, ActionStreamExt, Effect,
    PayloadStreamExt, TryActionStreamExt,
};
pub use redux_stream_types::{
    clear_state_action_type, hydrate_action_type, state, Action, ActionOrigin, ConfigError,
    EffectError, ReducerError, State, StoreError, StoreState,
};
