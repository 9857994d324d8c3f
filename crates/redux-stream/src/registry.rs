//! # Module State Registry
//!
//! One cached [`StateStream`] per module, created on first request and kept
//! for the store's lifetime. A stream replays its latest value to every new
//! subscriber and then pushes each changed state, in subscription order.
//!
//! ```text
//!   dispatch ──► commit ──► StateRegistry::publish(changed)
//!                                 │
//!                     ┌───────────┴───────────┐
//!                     ▼                       ▼
//!              StateStream(foo)        StateStream(bar)   (only if created)
//!               ├─ subscriber 1
//!               └─ subscriber 2
//! ```

use crate::container::StateContainer;
use futures::{Stream, StreamExt};
use parking_lot::{Mutex, ReentrantMutex};
use redux_stream_types::{State, StoreError};
use std::cell::Cell;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// One registered callback and the newest version it was handed.
struct Subscriber<T> {
    id: u64,
    callback: Callback<T>,
    /// Reentrant so a callback that makes the stream emit again still
    /// receives the newer value.
    delivered: ReentrantMutex<Cell<u64>>,
}

impl<T> Subscriber<T> {
    /// Deliver `value` unless something newer already reached this subscriber.
    fn offer(&self, version: u64, value: &T) {
        let delivered = self.delivered.lock();
        if version <= delivered.get() {
            return;
        }
        delivered.set(version);
        (self.callback)(value);
    }
}

struct Slot<T> {
    current: T,
    /// Starts at 1 for the seed value.
    version: u64,
    subscribers: Vec<Arc<Subscriber<T>>>,
    next_id: u64,
    emissions: u64,
}

struct StreamInner<T> {
    module: String,
    slot: Mutex<Slot<T>>,
}

/// Multicast stream that caches and replays its latest value.
///
/// Cloning yields another handle to the same stream.
pub struct StateStream<T> {
    inner: Arc<StreamInner<T>>,
}

impl<T> Clone for StateStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> StateStream<T> {
    /// Create a stream seeded with `initial`.
    pub fn new(module: impl Into<String>, initial: T) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                module: module.into(),
                slot: Mutex::new(Slot {
                    current: initial,
                    version: 1,
                    subscribers: Vec::new(),
                    next_id: 0,
                    emissions: 0,
                }),
            }),
        }
    }

    /// Name of the module this stream belongs to.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// The latest value.
    #[must_use]
    pub fn current(&self) -> T {
        self.inner.slot.lock().current.clone()
    }

    /// Register `on_next`. It receives the current value before this call
    /// returns, then every later emission until the subscription is dropped.
    ///
    /// A subscriber never receives a value older than one it already saw,
    /// even when emissions and subscriptions race across threads. No stream
    /// lock is held while callbacks run.
    pub fn subscribe<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let (subscriber, version, current) = {
            let mut slot = self.inner.slot.lock();
            let id = slot.next_id;
            slot.next_id += 1;
            let subscriber = Arc::new(Subscriber {
                id,
                callback: Box::new(on_next),
                delivered: ReentrantMutex::new(Cell::new(0)),
            });
            slot.subscribers.push(subscriber.clone());
            (subscriber, slot.version, slot.current.clone())
        };

        let id = subscriber.id;
        debug!(module = %self.inner.module, subscriber = id, "State stream subscribed");
        subscriber.offer(version, &current);

        let weak: Weak<StreamInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.slot.lock().subscribers.retain(|s| s.id != id);
                debug!(module = %inner.module, subscriber = id, "State stream unsubscribed");
            }
        })
    }

    /// Async view: yields the current value first, then every emission.
    #[must_use]
    pub fn watch(&self) -> StateWatch<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |value: &T| {
            // The receiver side owns this subscription, so a send failure
            // only happens while it is being dropped.
            let _ = sender.send(value.clone());
        });
        StateWatch {
            receiver,
            _subscription: subscription,
        }
    }

    /// Resolve with the first value, current or future, satisfying `predicate`.
    pub async fn wait_for<P>(&self, predicate: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        let mut watch = self.watch();
        while let Some(value) = watch.next().await {
            if predicate(&value) {
                return Some(value);
            }
        }
        None
    }

    /// Push a new value to every current subscriber.
    pub fn emit(&self, value: T) {
        let (version, subscribers) = {
            let mut slot = self.inner.slot.lock();
            slot.current = value.clone();
            slot.version += 1;
            slot.emissions += 1;
            (slot.version, slot.subscribers.clone())
        };

        for subscriber in subscribers {
            subscriber.offer(version, &value);
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.slot.lock().subscribers.len()
    }

    /// Number of values pushed after the initial seed.
    #[must_use]
    pub fn emission_count(&self) -> u64 {
        self.inner.slot.lock().emissions
    }

    /// Whether both handles refer to the same stream.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Handle that removes one callback; dropping it unsubscribes too.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving values.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

/// Async stream of state values produced by [`StateStream::watch`].
pub struct StateWatch<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    _subscription: Subscription,
}

impl<T> Stream for StateWatch<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Lazily-built, cached state streams for every registered module.
pub struct StateRegistry {
    container: Arc<StateContainer>,
    streams: Mutex<HashMap<String, StateStream<State>>>,
}

impl StateRegistry {
    pub(crate) fn new(container: Arc<StateContainer>) -> Self {
        Self {
            container,
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// The module's stream; repeated calls return the same stream.
    ///
    /// # Errors
    ///
    /// `StoreError::UnknownModule` if `module` is not registered.
    pub fn stream_for(&self, module: &str) -> Result<StateStream<State>, StoreError> {
        let mut streams = self.streams.lock();
        if let Some(stream) = streams.get(module) {
            return Ok(stream.clone());
        }

        let current = self
            .container
            .module(module)
            .ok_or_else(|| StoreError::UnknownModule(module.to_string()))?;

        let stream = StateStream::new(module, current);
        streams.insert(module.to_string(), stream.clone());
        debug!(module, "State stream created");
        Ok(stream)
    }

    /// The module's current state, read directly from the container.
    ///
    /// # Errors
    ///
    /// `StoreError::UnknownModule` if `module` is not registered.
    pub fn snapshot(&self, module: &str) -> Result<State, StoreError> {
        self.container
            .module(module)
            .ok_or_else(|| StoreError::UnknownModule(module.to_string()))
    }

    /// Number of streams created so far.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    /// Deliver committed changes to the streams that exist.
    pub(crate) fn publish(&self, changed: &[(String, State)]) {
        let targets: Vec<(StateStream<State>, State)> = {
            let streams = self.streams.lock();
            changed
                .iter()
                .filter_map(|(module, state)| {
                    streams.get(module).map(|stream| (stream.clone(), state.clone()))
                })
                .collect()
        };

        for (stream, state) in targets {
            // A stream created after the commit was already seeded with this value.
            if Arc::ptr_eq(&stream.current(), &state) {
                continue;
            }
            debug!(module = %stream.module(), "State stream emitting");
            stream.emit(state);
        }
    }
}
