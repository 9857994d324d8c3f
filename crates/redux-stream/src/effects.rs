//! # Effect Composer
//!
//! Runs every module's effects producers once, at store construction, and
//! feeds the actions their streams emit back into dispatch.
//!
//! ```text
//!   dispatch ──► bus.publish ──► drive(): poll every effect stream to Pending
//!                                   │
//!   effect stream 1 ──┐             │
//!   effect stream 2 ──┼──► feedback queue (mpsc, FIFO) ──► pump ──► dispatch(Effect)
//!   effect stream N ──┘
//! ```
//!
//! Effect pipelines run inline, inside the dispatch that triggered them, so
//! they observe the state right after that reduction. Each stream also has
//! a task holding its waker, which picks up anything that becomes ready
//! outside a dispatch (timers, other tasks). Only re-dispatch is deferred:
//! the pump is a separate task, so an emission is never reduced inside the
//! dispatch that triggered it, and emissions are reduced in queue order.

use crate::container::StateContainer;
use crate::module::ModuleRecord;
use crate::registry::{StateRegistry, StateStream};
use crate::store::StoreInner;
use futures::future;
use futures::task::noop_waker;
use futures::StreamExt;
use parking_lot::Mutex;
use redux_stream_bus::{ActionBus, ActionFilter, ActionSource, Effect};
use redux_stream_types::{Action, ActionOrigin, State, StoreError, StoreState};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What an effects producer can see besides `dispatch$`.
#[derive(Clone)]
pub struct EffectContext {
    module: String,
    container: Arc<StateContainer>,
    registry: Arc<StateRegistry>,
    effects: ActionSource,
}

impl EffectContext {
    pub(crate) fn new(
        module: impl Into<String>,
        container: Arc<StateContainer>,
        registry: Arc<StateRegistry>,
        effects: ActionSource,
    ) -> Self {
        Self {
            module: module.into(),
            container,
            registry,
            effects,
        }
    }

    /// Name of the module whose producer is running.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Synchronous whole-store snapshot.
    ///
    /// Called from an effect pipeline, this is the state right after the
    /// reduction of the action being handled.
    #[must_use]
    pub fn get_state(&self) -> StoreState {
        self.container.snapshot()
    }

    /// The cached state stream of `module`.
    ///
    /// # Errors
    ///
    /// `StoreError::UnknownModule` if `module` is not registered.
    pub fn get_state_stream(&self, module: &str) -> Result<StateStream<State>, StoreError> {
        self.registry.stream_for(module)
    }

    /// `effects$`: only actions that some effect emitted.
    #[must_use]
    pub fn effects(&self) -> &ActionSource {
        &self.effects
    }
}

/// One effect stream, polled inline by [`EffectDriver::drive`] and by its task.
struct EffectSlot {
    module: String,
    /// `None` once the stream completed or failed.
    stream: Mutex<Option<Effect>>,
    /// Waker of the owning task, reused for inline polls.
    waker: Mutex<Option<Waker>>,
}

impl EffectSlot {
    fn new(module: String, stream: Effect) -> Self {
        Self {
            module,
            stream: Mutex::new(Some(stream)),
            waker: Mutex::new(None),
        }
    }

    /// Poll until the stream is pending, queueing every emitted action.
    /// `Ready` means the stream is finished for good.
    fn drain(&self, cx: &mut Context<'_>, queue: &mpsc::UnboundedSender<Action>) -> Poll<()> {
        let mut slot = self.stream.lock();
        let Some(stream) = slot.as_mut() else {
            return Poll::Ready(());
        };

        loop {
            match stream.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(action))) => {
                    debug!(module = %self.module, action_type = %action.action_type, "Effect emitted");
                    if queue.send(action).is_err() {
                        // Pump is gone: the store is shutting down.
                        break;
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    error!(module = %self.module, error = %err, "Effect stream failed, subscription closed");
                    break;
                }
                Poll::Ready(None) => {
                    debug!(module = %self.module, "Effect stream completed");
                    break;
                }
            }
        }

        *slot = None;
        Poll::Ready(())
    }

    /// Inline poll. Uses the task's waker so its registrations stay with the task.
    fn drive(&self, queue: &mpsc::UnboundedSender<Action>) {
        let waker = self.waker.lock().clone().unwrap_or_else(noop_waker);
        let mut cx = Context::from_waker(&waker);
        if self.drain(&mut cx, queue).is_ready() {
            // Let the task observe the end and exit.
            waker.wake_by_ref();
        }
    }
}

/// Cheap handle the store uses to run effect pipelines inline.
pub(crate) struct EffectDriver {
    slots: Vec<Arc<EffectSlot>>,
    queue: mpsc::UnboundedSender<Action>,
}

impl EffectDriver {
    /// Poll every live effect stream until it has nothing more to emit now.
    pub(crate) fn drive(&self) {
        for slot in &self.slots {
            slot.drive(&self.queue);
        }
    }
}

/// Owns the effect tasks and the feedback pump for one store.
pub(crate) struct EffectComposer {
    driver: Arc<EffectDriver>,
    tasks: Vec<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl EffectComposer {
    /// Invoke every producer and start its streams.
    ///
    /// Returns `Ok(None)` when no module declares effects; a runtime is only
    /// required otherwise.
    pub(crate) fn start(
        modules: &[ModuleRecord],
        bus: &Arc<ActionBus>,
        container: &Arc<StateContainer>,
        registry: &Arc<StateRegistry>,
        store: Weak<StoreInner>,
    ) -> Result<Option<Self>, StoreError> {
        if modules.iter().all(|m| m.effects.is_empty()) {
            return Ok(None);
        }

        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let dispatch = ActionSource::new(bus.clone(), ActionFilter::all());
        let effects = ActionSource::new(bus.clone(), ActionFilter::effects_only());
        let (queue, pending) = mpsc::unbounded_channel::<Action>();

        let mut slots = Vec::new();
        for module in modules {
            for producer in &module.effects {
                let context = EffectContext::new(
                    module.name.clone(),
                    container.clone(),
                    registry.clone(),
                    effects.clone(),
                );

                let streams =
                    producer(&dispatch, &context).map_err(|source| StoreError::EffectSetup {
                        module: module.name.clone(),
                        source,
                    })?;

                slots.extend(
                    streams
                        .into_iter()
                        .map(|effect| Arc::new(EffectSlot::new(module.name.clone(), effect))),
                );
            }
        }

        let driver = Arc::new(EffectDriver { slots, queue });
        let tasks = driver
            .slots
            .iter()
            .map(|slot| runtime.spawn(run_effect(slot.clone(), driver.queue.clone())))
            .collect();
        let composer = Self {
            driver,
            tasks,
            pump: Some(runtime.spawn(drain_feedback(pending, store))),
        };

        // Replayed state-stream values are handled before the store is returned.
        composer.driver.drive();

        info!(
            effects = composer.tasks.len(),
            "Effect subscriptions established"
        );
        Ok(Some(composer))
    }

    /// Handle for inline driving.
    pub(crate) fn driver(&self) -> Arc<EffectDriver> {
        self.driver.clone()
    }

    /// Number of effect subscriptions started.
    pub(crate) fn subscription_count(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every effect task and the pump.
    pub(crate) fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for EffectComposer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_effect(slot: Arc<EffectSlot>, queue: mpsc::UnboundedSender<Action>) {
    future::poll_fn(|cx| {
        *slot.waker.lock() = Some(cx.waker().clone());
        slot.drain(cx, &queue)
    })
    .await;
}

async fn drain_feedback(mut pending: mpsc::UnboundedReceiver<Action>, store: Weak<StoreInner>) {
    while let Some(action) = pending.recv().await {
        let Some(store) = store.upgrade() else {
            break;
        };

        let action_type = action.action_type.clone();
        match store.dispatch_with_origin(action, ActionOrigin::Effect) {
            Ok(_) => {}
            Err(StoreError::ShutDown) => break,
            Err(err) => {
                warn!(action_type = %action_type, error = %err, "Effect-originated dispatch failed");
            }
        }
    }
    debug!("Effect feedback pump stopped");
}
