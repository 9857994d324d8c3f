//! # Stream Operators
//!
//! The handful of combinators effects are written with. Everything else
//! (`filter`, `map`, `select`, ...) comes from `futures::StreamExt`.
//!
//! ```rust,ignore
//! let derived = dispatch
//!     .filter_action("BAR")
//!     .pluck_payload()
//!     .map(|bar| bar.as_i64().unwrap_or_default() * 2)
//!     .map_action("BAR_EFFECT")
//!     .into_effect();
//! ```

use futures::future;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::borrow::Borrow;
use redux_stream_types::{Action, EffectError};
use serde_json::Value;

/// One effect subscription: a stream of actions to feed back into dispatch.
///
/// An `Err` item ends that effect; other effects keep running.
pub type Effect = BoxStream<'static, Result<Action, EffectError>>;

/// Operators on streams of actions.
pub trait ActionStreamExt: Stream<Item = Action> + Sized {
    /// Map each action to its payload; a missing payload becomes `null`.
    fn pluck_payload(self) -> BoxStream<'static, Value>
    where
        Self: Send + 'static,
    {
        self.map(|action| action.payload.unwrap_or(Value::Null))
            .boxed()
    }

    /// Finish an infallible action stream as an effect.
    fn into_effect(self) -> Effect
    where
        Self: Send + 'static,
    {
        self.map(Ok).boxed()
    }
}

impl<S: Stream<Item = Action>> ActionStreamExt for S {}

/// Operators on streams of payload-like values.
pub trait PayloadStreamExt: Stream + Sized {
    /// Wrap each item as the payload of an action of `action_type`.
    fn map_action(self, action_type: impl Into<String>) -> BoxStream<'static, Action>
    where
        Self: Send + 'static,
        Self::Item: Into<Value>,
    {
        let action_type = action_type.into();
        self.map(move |item| Action::with_payload(action_type.clone(), item))
            .boxed()
    }

    /// Replace every item with the same constant value.
    fn map_to(self, value: impl Into<Value>) -> BoxStream<'static, Value>
    where
        Self: Send + 'static,
    {
        let value = value.into();
        self.map(move |_| value.clone()).boxed()
    }

    /// Project `field` out of each JSON object; anything else yields `null`.
    fn pluck(self, field: impl Into<String>) -> BoxStream<'static, Value>
    where
        Self: Send + 'static,
        Self::Item: Borrow<Value>,
    {
        let field = field.into();
        self.map(move |item| item.borrow().get(&field).cloned().unwrap_or(Value::Null))
            .boxed()
    }

    /// Drop items equal to the one emitted just before.
    fn distinct_until_changed(self) -> BoxStream<'static, Self::Item>
    where
        Self: Send + 'static,
        Self::Item: PartialEq + Clone + Send + 'static,
    {
        let mut last: Option<Self::Item> = None;
        self.filter_map(move |item| {
            let fresh = last.as_ref() != Some(&item);
            if fresh {
                last = Some(item.clone());
            }
            future::ready(fresh.then_some(item))
        })
        .boxed()
    }
}

impl<S: Stream> PayloadStreamExt for S {}

/// Operators on fallible action streams.
pub trait TryActionStreamExt: Stream<Item = Result<Action, EffectError>> + Sized {
    /// Finish a fallible action stream as an effect.
    fn into_fallible_effect(self) -> Effect
    where
        Self: Send + 'static,
    {
        self.boxed()
    }
}

impl<S: Stream<Item = Result<Action, EffectError>>> TryActionStreamExt for S {}
