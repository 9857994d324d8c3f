//! # Action Publisher
//!
//! Defines the publishing side of the action bus.

use crate::events::{ActionFilter, BusMessage};
use crate::subscriber::{ActionStream, ActionSubscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use redux_stream_types::{Action, ActionOrigin};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for publishing actions to the bus.
///
/// The store republishes every reduced action through this interface.
pub trait ActionPublisher: Send + Sync {
    /// Publish an action to the bus.
    ///
    /// # Returns
    ///
    /// The number of subscribers whose filter accepted the action.
    fn publish(&self, action: Action, origin: ActionOrigin) -> usize;

    /// Get the total number of actions published.
    fn actions_published(&self) -> u64;
}

/// One registered receiver.
struct Subscriber {
    id: u64,
    filter: ActionFilter,
    sender: mpsc::UnboundedSender<BusMessage>,
    backlog: Arc<AtomicUsize>,
}

/// Subscriber table shared between the bus and subscription guards.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RwLock<Vec<Subscriber>>,
    /// Active subscription count by filter key.
    by_filter: RwLock<HashMap<String, usize>>,
}

impl Subscribers {
    pub(crate) fn remove(&self, id: u64, key: &str) {
        self.entries.write().retain(|s| s.id != id);

        let mut counts = self.by_filter.write();
        if let Some(count) = counts.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(key);
            }
        }
    }
}

/// In-memory action bus.
///
/// Every subscription owns an unbounded queue that is filled at publish time,
/// so publishing never blocks and no subscriber ever loses an action. Filters
/// are applied before enqueueing: a subscriber never wakes for an action it
/// does not accept. A subscriber whose backlog reaches `capacity` is logged
/// at `warn`.
pub struct ActionBus {
    subscribers: Arc<Subscribers>,

    next_id: AtomicU64,

    /// Total actions published.
    actions_published: AtomicU64,

    /// Backlog warning threshold.
    capacity: usize,
}

impl ActionBus {
    /// Create a new action bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new action bus with specified backlog warning threshold.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Subscribers::default()),
            next_id: AtomicU64::new(0),
            actions_published: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to actions matching a filter.
    ///
    /// Only actions published after this call are observed.
    #[must_use]
    pub fn subscribe(&self, filter: ActionFilter) -> ActionSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let backlog = Arc::new(AtomicUsize::new(0));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = filter.key();

        self.subscribers.entries.write().push(Subscriber {
            id,
            filter: filter.clone(),
            sender,
            backlog: backlog.clone(),
        });
        *self.subscribers.by_filter.write().entry(key.clone()).or_insert(0) += 1;

        debug!(types = ?filter.types, origins = ?filter.origins, "New bus subscription");

        ActionSubscription::new(
            receiver,
            filter,
            backlog,
            Arc::downgrade(&self.subscribers),
            id,
            key,
        )
    }

    /// Get a stream of actions matching a filter.
    #[must_use]
    pub fn action_stream(&self, filter: ActionFilter) -> ActionStream {
        self.subscribe(filter).into_stream()
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.entries.read().len()
    }

    /// Get the number of live subscriptions whose filter names `action_type`.
    #[must_use]
    pub fn interest_in(&self, action_type: &str) -> usize {
        let needle = format!("{action_type:?}");
        self.subscribers
            .by_filter
            .read()
            .iter()
            .filter(|(key, _)| key.contains(&needle))
            .map(|(_, count)| *count)
            .sum()
    }

    /// Actions queued but not yet received, summed over all subscribers.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.subscribers
            .entries
            .read()
            .iter()
            .map(|s| s.backlog.load(Ordering::Relaxed))
            .sum()
    }

    /// Get the backlog warning threshold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ActionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionPublisher for ActionBus {
    fn publish(&self, action: Action, origin: ActionOrigin) -> usize {
        // Counted even when nobody is listening.
        let sequence = self.actions_published.fetch_add(1, Ordering::Relaxed) + 1;
        let message = BusMessage {
            action,
            origin,
            sequence,
        };

        let mut receivers = 0;
        for subscriber in self.subscribers.entries.read().iter() {
            if !subscriber.filter.matches(&message) {
                continue;
            }
            let queued = subscriber.backlog.fetch_add(1, Ordering::Relaxed) + 1;
            if subscriber.sender.send(message.clone()).is_err() {
                // Receiver is being dropped; its guard removes the entry.
                subscriber.backlog.fetch_sub(1, Ordering::Relaxed);
                continue;
            }
            if queued == self.capacity {
                warn!(
                    subscriber = subscriber.id,
                    backlog = queued,
                    "Bus subscriber falling behind"
                );
            }
            receivers += 1;
        }

        debug!(
            action_type = %message.action.action_type,
            origin = ?origin,
            sequence,
            receivers,
            "Action published"
        );
        receivers
    }

    fn actions_published(&self) -> u64 {
        self.actions_published.load(Ordering::Relaxed)
    }
}
