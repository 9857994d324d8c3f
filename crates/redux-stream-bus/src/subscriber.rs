//! # Action Subscriber
//!
//! Defines the subscription side of the action bus.

use crate::events::{ActionFilter, BusMessage};
use crate::publisher::{ActionBus, Subscribers};
use futures::StreamExt;
use redux_stream_types::Action;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{ready, Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The action bus was closed.
    #[error("Action bus closed")]
    Closed,
}

/// Removes the subscriber from the bus when a subscription goes away.
struct SubscriptionGuard {
    subscribers: Weak<Subscribers>,
    id: u64,
    key: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(self.id, &self.key);
        }
        debug!(filter = %self.key, "Bus subscription dropped");
    }
}

/// A subscription handle for receiving actions.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct ActionSubscription {
    /// Queue filled by the bus at publish time.
    receiver: mpsc::UnboundedReceiver<BusMessage>,

    /// Filter for this subscription.
    filter: ActionFilter,

    /// Messages queued and not yet received.
    backlog: Arc<AtomicUsize>,

    guard: SubscriptionGuard,
}

impl ActionSubscription {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<BusMessage>,
        filter: ActionFilter,
        backlog: Arc<AtomicUsize>,
        subscribers: Weak<Subscribers>,
        id: u64,
        key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            backlog,
            guard: SubscriptionGuard {
                subscribers,
                id,
                key,
            },
        }
    }

    /// Receive the next message that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<BusMessage> {
        let message = self.receiver.recv().await?;
        self.backlog.fetch_sub(1, Ordering::Relaxed);
        Some(message)
    }

    /// Try to receive the next matching message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available
    /// - `Ok(None)` - No matching message is available yet
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(message) => {
                self.backlog.fetch_sub(1, Ordering::Relaxed);
                Ok(Some(message))
            }
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &ActionFilter {
        &self.filter
    }

    /// Convert into a `Stream` of matching actions.
    #[must_use]
    pub fn into_stream(self) -> ActionStream {
        ActionStream {
            inner: UnboundedReceiverStream::new(self.receiver),
            filter: self.filter,
            backlog: self.backlog,
            _guard: self.guard,
        }
    }
}

/// A stream of actions accepted by a filter.
///
/// The underlying queue is registered when the stream is created, so no
/// action published afterwards is missed even if the stream is polled late.
pub struct ActionStream {
    inner: UnboundedReceiverStream<BusMessage>,
    filter: ActionFilter,
    backlog: Arc<AtomicUsize>,
    _guard: SubscriptionGuard,
}

impl ActionStream {
    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &ActionFilter {
        &self.filter
    }
}

impl Stream for ActionStream {
    type Item = Action;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let message = ready!(self.inner.poll_next_unpin(cx));
        Poll::Ready(message.map(|message| {
            self.backlog.fetch_sub(1, Ordering::Relaxed);
            message.action
        }))
    }
}

/// A re-subscribable view over the bus.
///
/// Each call to `stream`, `filter_action` or `filter_actions` opens a fresh
/// subscription narrowed from this source's base filter, so one source can
/// feed any number of independent derived streams.
#[derive(Clone)]
pub struct ActionSource {
    bus: Arc<ActionBus>,
    base: ActionFilter,
}

impl ActionSource {
    /// Create a source over `bus` restricted by `base`.
    #[must_use]
    pub fn new(bus: Arc<ActionBus>, base: ActionFilter) -> Self {
        Self { bus, base }
    }

    /// Every action accepted by the base filter.
    #[must_use]
    pub fn stream(&self) -> ActionStream {
        self.bus.action_stream(self.base.clone())
    }

    /// Only actions of the given type.
    #[must_use]
    pub fn filter_action(&self, action_type: impl Into<String>) -> ActionStream {
        self.filter_actions([action_type.into()])
    }

    /// Only actions whose type is one of `action_types`.
    #[must_use]
    pub fn filter_actions<I, S>(&self, action_types: I) -> ActionStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bus
            .action_stream(self.base.clone().with_types(action_types))
    }

    /// A raw subscription with the base filter.
    #[must_use]
    pub fn subscribe(&self) -> ActionSubscription {
        self.bus.subscribe(self.base.clone())
    }

    /// The base filter of this source.
    #[must_use]
    pub fn filter(&self) -> &ActionFilter {
        &self.base
    }
}
