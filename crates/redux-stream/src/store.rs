//! # Store Facade
//!
//! Builds the normalized module list, seeds initial state, wires the action
//! bus and starts effects. `dispatch` is synchronous end to end: when it
//! returns, the container, every state-stream subscriber and every listener
//! already reflect the reduction.

use crate::config::StoreConfig;
use crate::container::StateContainer;
use crate::effects::EffectComposer;
use crate::middleware::{Middleware, MiddlewareApi};
use crate::module::{ModuleMap, ModuleRecord};
use crate::registry::{StateRegistry, StateStream, Subscription};
use parking_lot::Mutex;
use redux_stream_bus::{ActionBus, ActionFilter, ActionPublisher, ActionSource};
use redux_stream_types::{
    clear_state_action_type, hydrate_action_type, state, Action, ActionOrigin, ConfigError, State,
    StoreError, StoreState, INIT_ACTION_TYPE,
};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle to a store. Clones share the same store; effects stop when the
/// last handle is dropped.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    modules: Vec<ModuleRecord>,
    container: Arc<StateContainer>,
    registry: Arc<StateRegistry>,
    bus: Arc<ActionBus>,
    middleware: Vec<Arc<dyn Middleware>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    /// Serializes reduction and notification.
    gate: Mutex<()>,
    /// Thread currently inside the gate, and what it is doing.
    active: Mutex<Option<(ThreadId, Phase)>>,
    /// Dispatches made from listeners or stream callbacks, reduced after the
    /// current pass.
    deferred: Mutex<VecDeque<(Action, ActionOrigin)>>,
    effects: Mutex<Option<EffectComposer>>,
    shut_down: AtomicBool,
    config: StoreConfig,
}

/// Create a store with default configuration.
///
/// `preloaded` must be a JSON object keyed by module name when given.
pub fn create_enhanced_store(
    modules: ModuleMap,
    preloaded: Option<Value>,
) -> Result<Store, StoreError> {
    let mut builder = Store::builder(modules);
    if let Some(preloaded) = preloaded {
        builder = builder.preloaded_state(preloaded);
    }
    builder.build()
}

/// Assembles a [`Store`].
pub struct StoreBuilder {
    modules: ModuleMap,
    preloaded: Option<Value>,
    config: StoreConfig,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl StoreBuilder {
    /// Start from a module map.
    #[must_use]
    pub fn new(modules: ModuleMap) -> Self {
        Self {
            modules,
            preloaded: None,
            config: StoreConfig::default(),
            middleware: Vec::new(),
        }
    }

    /// Initial state overriding reducer defaults, keyed by module name.
    #[must_use]
    pub fn preloaded_state(mut self, preloaded: Value) -> Self {
        self.preloaded = Some(preloaded);
        self
    }

    /// Replace the default configuration.
    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a middleware. The first one added wraps all later ones.
    #[must_use]
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Build the store and start its effects.
    ///
    /// # Errors
    ///
    /// - `StoreError::Config` for invalid configuration or preloaded state
    /// - `StoreError::DuplicateModule` if a name is registered twice
    /// - `StoreError::Reducer` if a reducer fails to produce its initial state
    /// - `StoreError::NoRuntime` if effects are declared outside a Tokio runtime
    /// - `StoreError::EffectSetup` if an effects producer fails
    pub fn build(self) -> Result<Store, StoreError> {
        self.config.validate()?;
        let modules = self.modules.normalize()?;
        let initial = initial_state(&modules, self.preloaded)?;

        let container = Arc::new(StateContainer::new(initial));
        let registry = Arc::new(StateRegistry::new(container.clone()));
        let bus = Arc::new(ActionBus::with_capacity(self.config.bus_capacity));

        let inner = Arc::new(StoreInner {
            modules,
            container,
            registry,
            bus,
            middleware: self.middleware,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            gate: Mutex::new(()),
            active: Mutex::new(None),
            deferred: Mutex::new(VecDeque::new()),
            effects: Mutex::new(None),
            shut_down: AtomicBool::new(false),
            config: self.config,
        });

        let composer = EffectComposer::start(
            &inner.modules,
            &inner.bus,
            &inner.container,
            &inner.registry,
            Arc::downgrade(&inner),
        )?;
        *inner.effects.lock() = composer;

        info!(
            modules = inner.modules.len(),
            middleware = inner.middleware.len(),
            bus_capacity = inner.config.bus_capacity,
            "Store created"
        );
        Ok(Store { inner })
    }
}

fn initial_state(modules: &[ModuleRecord], preloaded: Option<Value>) -> Result<StoreState, StoreError> {
    let preloaded = match preloaded {
        None => Map::new(),
        Some(Value::Object(fields)) => fields,
        Some(_) => return Err(ConfigError::InvalidPreloadedState.into()),
    };

    for key in preloaded.keys() {
        if !modules.iter().any(|m| &m.name == key) {
            warn!(module = %key, "Preloaded state for unregistered module ignored");
        }
    }

    let init = Action::new(INIT_ACTION_TYPE);
    let mut initial = StoreState::new();
    for module in modules {
        let seed = preloaded.get(&module.name).cloned().map(state);
        let reduced = (module.reducer)(seed.as_ref(), &init).map_err(|source| StoreError::Reducer {
            module: module.name.clone(),
            source,
        })?;
        initial.insert(module.name.clone(), reduced);
    }
    Ok(initial)
}

impl Store {
    /// Start building a store.
    #[must_use]
    pub fn builder(modules: ModuleMap) -> StoreBuilder {
        StoreBuilder::new(modules)
    }

    /// Whole-store snapshot.
    #[must_use]
    pub fn get_state(&self) -> StoreState {
        self.inner.container.snapshot()
    }

    /// One module's current state.
    pub fn get_module_state(&self, module: &str) -> Result<State, StoreError> {
        self.inner.registry.snapshot(module)
    }

    /// The module's cached state stream (`getState$`).
    ///
    /// # Errors
    ///
    /// `StoreError::UnknownModule` if `module` is not registered.
    pub fn get_state_stream(&self, module: &str) -> Result<StateStream<State>, StoreError> {
        self.inner.registry.stream_for(module)
    }

    /// Reduce `action` through every module and return it.
    ///
    /// Called from a store listener or a state-stream callback, the action
    /// passes the middleware chain immediately and is reduced right after
    /// the current notification pass, before the outer `dispatch` returns.
    /// Reducer errors of such deferred actions are logged, not returned.
    ///
    /// # Errors
    ///
    /// - `StoreError::Reducer` if any reducer fails; nothing is committed
    /// - `StoreError::ReentrantDispatch` if called from inside a reducer
    /// - `StoreError::ShutDown` after [`Store::shutdown`]
    pub fn dispatch(&self, action: Action) -> Result<Action, StoreError> {
        self.inner.dispatch_with_origin(action, ActionOrigin::Dispatch)
    }

    /// Register a listener called after every successful dispatch.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));

        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Dispatch `"{module}/HYDRATE"` with `payload`.
    ///
    /// # Errors
    ///
    /// `StoreError::UnknownModule` before anything is dispatched, otherwise as
    /// [`Store::dispatch`].
    pub fn hydrate(&self, module: &str, payload: impl Into<Value>) -> Result<Action, StoreError> {
        self.ensure_module(module)?;
        self.dispatch(Action::with_payload(hydrate_action_type(module), payload))
    }

    /// Dispatch `"{module}/CLEAR_STATE"`.
    ///
    /// # Errors
    ///
    /// `StoreError::UnknownModule` before anything is dispatched, otherwise as
    /// [`Store::dispatch`].
    pub fn clear_state(&self, module: &str) -> Result<Action, StoreError> {
        self.ensure_module(module)?;
        self.dispatch(Action::new(clear_state_action_type(module)))
    }

    /// Registered module names in registration order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.inner.modules.iter().map(|m| m.name.as_str())
    }

    /// `dispatch$`: every reduced action.
    #[must_use]
    pub fn dispatch_source(&self) -> ActionSource {
        ActionSource::new(self.inner.bus.clone(), ActionFilter::all())
    }

    /// `effects$`: only effect-originated actions.
    #[must_use]
    pub fn effects_source(&self) -> ActionSource {
        ActionSource::new(self.inner.bus.clone(), ActionFilter::effects_only())
    }

    /// Number of live effect subscriptions.
    #[must_use]
    pub fn effect_subscription_count(&self) -> usize {
        self.inner
            .effects
            .lock()
            .as_ref()
            .map_or(0, EffectComposer::subscription_count)
    }

    /// Stop all effects and reject further dispatches. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(mut composer) = self.inner.effects.lock().take() {
            composer.shutdown();
        }
        info!("Store shut down");
    }

    /// Whether [`Store::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_module(&self, module: &str) -> Result<(), StoreError> {
        if self.inner.container.contains(module) {
            Ok(())
        } else {
            Err(StoreError::UnknownModule(module.to_string()))
        }
    }
}

impl StoreInner {
    pub(crate) fn container(&self) -> &StateContainer {
        &self.container
    }

    pub(crate) fn dispatch_with_origin(
        &self,
        action: Action,
        origin: ActionOrigin,
    ) -> Result<Action, StoreError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(StoreError::ShutDown);
        }
        self.run_chain(0, action, origin)
    }

    fn run_chain(&self, index: usize, action: Action, origin: ActionOrigin) -> Result<Action, StoreError> {
        let Some(middleware) = self.middleware.get(index) else {
            return self.reduce_and_publish(action, origin);
        };

        let api = MiddlewareApi::new(self, origin);
        let next = |action: Action| self.run_chain(index + 1, action, origin);
        middleware.handle(&api, action, &next)
    }

    fn reduce_and_publish(&self, action: Action, origin: ActionOrigin) -> Result<Action, StoreError> {
        let current_thread = thread::current().id();
        let active = *self.active.lock();
        match active {
            Some((thread, Phase::Reducing)) if thread == current_thread => {
                return Err(StoreError::ReentrantDispatch {
                    action_type: action.action_type,
                });
            }
            Some((thread, Phase::Notifying)) if thread == current_thread => {
                debug!(action_type = %action.action_type, "Dispatch from notification deferred");
                self.deferred.lock().push_back((action.clone(), origin));
                return Ok(action);
            }
            _ => {}
        }

        let _gate = self.gate.lock();
        let mut phase = PhaseMarker::enter(&self.active, current_thread);

        let result = self.reduce_once(&mut phase, action, origin);

        loop {
            let next = self.deferred.lock().pop_front();
            let Some((nested, nested_origin)) = next else {
                break;
            };
            let action_type = nested.action_type.clone();
            if let Err(err) = self.reduce_once(&mut phase, nested, nested_origin) {
                warn!(action_type = %action_type, error = %err, "Deferred dispatch failed");
            }
        }

        result
    }

    /// One reduction followed by its notifications. Runs inside the gate.
    fn reduce_once(
        &self,
        phase: &mut PhaseMarker<'_>,
        action: Action,
        origin: ActionOrigin,
    ) -> Result<Action, StoreError> {
        phase.set(Phase::Reducing);

        if self.shut_down.load(Ordering::SeqCst) {
            return Err(StoreError::ShutDown);
        }

        let current = self.container.snapshot();
        let mut next = current.clone();
        let mut changed = Vec::new();

        for module in &self.modules {
            let previous = current.get(&module.name);
            let reduced = (module.reducer)(previous, &action).map_err(|source| StoreError::Reducer {
                module: module.name.clone(),
                source,
            })?;

            if !previous.is_some_and(|prev| Arc::ptr_eq(prev, &reduced)) {
                next.insert(module.name.clone(), reduced.clone());
                changed.push((module.name.clone(), reduced));
            }
        }

        if !changed.is_empty() {
            self.container.commit(next);
        }
        phase.set(Phase::Notifying);

        if !changed.is_empty() {
            self.registry.publish(&changed);
        }

        let listeners: Vec<Listener> = self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener();
        }

        let receivers = self.bus.publish(action.clone(), origin);

        let driver = self.effects.lock().as_ref().map(EffectComposer::driver);
        if let Some(driver) = driver {
            driver.drive();
        }

        if self.config.log_actions {
            info!(
                action_type = %action.action_type,
                origin = ?origin,
                changed = changed.len(),
                receivers,
                "Action reduced"
            );
        } else {
            debug!(
                action_type = %action.action_type,
                origin = ?origin,
                changed = changed.len(),
                receivers,
                "Action reduced"
            );
        }

        Ok(action)
    }
}

/// What the thread inside the gate is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Reducers are running; dispatch is an error.
    Reducing,
    /// Streams, listeners and effects are being notified; dispatch is deferred.
    Notifying,
}

/// Records the gate holder's thread and phase; cleared on drop.
struct PhaseMarker<'a> {
    slot: &'a Mutex<Option<(ThreadId, Phase)>>,
    thread: ThreadId,
}

impl<'a> PhaseMarker<'a> {
    fn enter(slot: &'a Mutex<Option<(ThreadId, Phase)>>, thread: ThreadId) -> Self {
        *slot.lock() = Some((thread, Phase::Reducing));
        Self { slot, thread }
    }

    fn set(&mut self, phase: Phase) {
        *self.slot.lock() = Some((self.thread, phase));
    }
}

impl Drop for PhaseMarker<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}
