//! # Composition and Lifecycle Scenarios
//!
//! Middleware wrapping, store listeners, reducer failures, configuration and
//! teardown.

#[cfg(test)]
mod tests {
    use crate::fixtures::{appended, init_tracing, or_default, Recorder, SETTLE};
    use futures::StreamExt;
    use parking_lot::Mutex;
    use redux_stream::{
        config::{ENV_BUS_CAPACITY, ENV_LOG_ACTIONS},
        effects_fn, Action, ActionOrigin, ActionStreamExt, ConfigError, Middleware, MiddlewareApi,
        ModuleDef, ModuleMap, Next, ReducerError, State, Store, StoreConfig, StoreError,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    const FOO: &str = "@test/FOO";
    const REJECT: &str = "@test/REJECT";

    fn foo_module() -> ModuleDef {
        ModuleDef::bare(|state: Option<&State>, action: &Action| {
            let current = or_default(state, || json!([1, 2]));
            if action.is(FOO) {
                return Ok(appended(&current, None, action.payload().cloned().unwrap_or_default()));
            }
            Ok(current)
        })
    }

    fn strict_module() -> ModuleDef {
        ModuleDef::bare(|state: Option<&State>, action: &Action| {
            if action.is(REJECT) {
                return Err(ReducerError::new("REJECT is not allowed"));
            }
            Ok(or_default(state, || json!({ "count": 0 })))
        })
    }

    // =============================================================================
    // MIDDLEWARE
    // =============================================================================

    /// Records `(type, before, after)` for every action, like a dispatch logger.
    struct ActionLog {
        entries: Arc<Mutex<Vec<(String, Value, Value)>>>,
    }

    impl Middleware for ActionLog {
        fn handle(&self, api: &MiddlewareApi<'_>, action: Action, next: Next<'_>) -> Result<Action, StoreError> {
            let before = api.get_state().to_value();
            let action_type = action.action_type.clone();
            let result = next(action);
            self.entries.lock().push((action_type, before, api.get_state().to_value()));
            result
        }
    }

    /// Rewrites `@test/DOUBLE` into two FOO dispatches.
    struct Expand;

    impl Middleware for Expand {
        fn handle(&self, api: &MiddlewareApi<'_>, action: Action, next: Next<'_>) -> Result<Action, StoreError> {
            if action.is("@test/DOUBLE") {
                let payload = action.payload().cloned().unwrap_or_default();
                api.dispatch(Action::with_payload(FOO, payload.clone()))?;
                return next(Action::with_payload(FOO, payload));
            }
            next(action)
        }
    }

    #[test]
    fn test_clear_state_through_logging_middleware() {
        init_tracing();
        let entries = Arc::new(Mutex::new(Vec::new()));
        let store = Store::builder(ModuleMap::new().with("fooModule", foo_module()))
            .middleware(ActionLog { entries: entries.clone() })
            .build()
            .unwrap();
        let foo = Recorder::follow(&store.get_state_stream("fooModule").unwrap());

        store.dispatch(Action::with_payload(FOO, 3)).unwrap();
        store.dispatch(Action::with_payload(FOO, 4)).unwrap();
        assert_eq!(foo.last(), json!([1, 2, 3, 4]));

        store.clear_state("fooModule").unwrap();
        assert_eq!(foo.last(), json!([1, 2]));

        let entries = entries.lock();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].0, "fooModule/CLEAR_STATE");
        assert_eq!(entries[2].1, json!({ "fooModule": [1, 2, 3, 4] }));
        assert_eq!(entries[2].2, json!({ "fooModule": [1, 2] }));
    }

    #[test]
    fn test_outer_middleware_sees_inner_rewrites() {
        init_tracing();
        let entries = Arc::new(Mutex::new(Vec::new()));
        let store = Store::builder(ModuleMap::new().with("fooModule", foo_module()))
            .middleware(ActionLog { entries: entries.clone() })
            .middleware(Expand)
            .build()
            .unwrap();

        store.dispatch(Action::with_payload("@test/DOUBLE", 7)).unwrap();

        assert_eq!(*store.get_module_state("fooModule").unwrap(), json!([1, 2, 7, 7]));
        let types: Vec<String> = entries.lock().iter().map(|(t, _, _)| t.clone()).collect();
        // The nested dispatch re-enters from the top and finishes first.
        assert_eq!(types, vec![FOO.to_string(), "@test/DOUBLE".to_string()]);
    }

    /// Counts effect-originated actions seen by the chain.
    struct OriginCount {
        effects: Arc<Mutex<usize>>,
    }

    impl Middleware for OriginCount {
        fn handle(&self, api: &MiddlewareApi<'_>, action: Action, next: Next<'_>) -> Result<Action, StoreError> {
            if api.origin() == ActionOrigin::Effect {
                *self.effects.lock() += 1;
            }
            next(action)
        }
    }

    #[tokio::test]
    async fn test_effect_dispatches_pass_through_middleware() -> anyhow::Result<()> {
        init_tracing();
        let echo = effects_fn(|dispatch, _| {
            Ok(vec![dispatch
                .filter_action("@test/PING")
                .map(|_| Action::with_payload(FOO, 9))
                .into_effect()])
        });
        let counted = Arc::new(Mutex::new(0));
        let store = Store::builder(
            ModuleMap::new()
                .with("fooModule", foo_module())
                .with("echoModule", ModuleDef::declared(|state: Option<&State>, _: &Action| Ok(or_default(state, || json!(null))), vec![echo])),
        )
        .middleware(OriginCount { effects: counted.clone() })
        .build()?;

        store.dispatch(Action::new("@test/PING"))?;
        crate::fixtures::settle(&store.get_state_stream("fooModule")?, &json!([1, 2, 9])).await?;
        assert_eq!(*counted.lock(), 1);
        Ok(())
    }

    // =============================================================================
    // LISTENERS AND FAILURES
    // =============================================================================

    #[test]
    fn test_listener_sees_committed_state() {
        init_tracing();
        let store = Store::builder(ModuleMap::new().with("fooModule", foo_module()))
            .build()
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handle = store.clone();
        let sink = seen.clone();
        let listener = store.subscribe(move || {
            sink.lock().push(handle.get_module_state("fooModule").map(|s| (*s).clone()).ok());
        });

        store.dispatch(Action::with_payload(FOO, 3)).unwrap();
        store.dispatch(Action::new("@test/IGNORED")).unwrap();
        listener.unsubscribe();
        store.dispatch(Action::with_payload(FOO, 4)).unwrap();

        assert_eq!(*seen.lock(), vec![Some(json!([1, 2, 3])), Some(json!([1, 2, 3]))]);
    }

    #[test]
    fn test_reducer_failure_leaves_everything_untouched() {
        init_tracing();
        let store = Store::builder(
            ModuleMap::new()
                .with("fooModule", foo_module())
                .with("strictModule", strict_module()),
        )
        .build()
        .unwrap();
        let foo_stream = store.get_state_stream("fooModule").unwrap();
        let foo = Recorder::follow(&foo_stream);
        let before = store.get_state();

        let err = store.dispatch(Action::with_payload(REJECT, 1)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Reducer { ref module, ref source } if module == "strictModule" && source.0 == "REJECT is not allowed"
        ));
        assert_eq!(store.get_state(), before);
        assert_eq!(foo.history(), vec![json!([1, 2])]);

        // The store keeps working afterwards.
        store.dispatch(Action::with_payload(FOO, 3)).unwrap();
        assert_eq!(foo.last(), json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_failed_dispatch_is_not_published() -> anyhow::Result<()> {
        init_tracing();
        let store = Store::builder(ModuleMap::new().with("strictModule", strict_module())).build()?;
        let mut actions = store.dispatch_source().stream();

        assert!(store.dispatch(Action::new(REJECT)).is_err());
        store.dispatch(Action::new("@test/OK"))?;

        let first = tokio::time::timeout(SETTLE, actions.next()).await?;
        assert_eq!(first, Some(Action::new("@test/OK")));
        Ok(())
    }

    #[test]
    fn test_duplicate_module_rejected() {
        init_tracing();
        let modules = ModuleMap::new()
            .with("fooModule", foo_module())
            .with("fooModule", foo_module());
        assert_eq!(
            Store::builder(modules).build().err(),
            Some(StoreError::DuplicateModule("fooModule".into()))
        );
    }

    // =============================================================================
    // CONFIGURATION
    // =============================================================================

    #[test]
    fn test_config_from_env() {
        std::env::set_var(ENV_BUS_CAPACITY, "64");
        std::env::set_var(ENV_LOG_ACTIONS, "true");
        let config = StoreConfig::from_env();

        std::env::set_var(ENV_BUS_CAPACITY, "lots");
        let invalid = StoreConfig::from_env();

        std::env::remove_var(ENV_BUS_CAPACITY);
        std::env::remove_var(ENV_LOG_ACTIONS);

        assert_eq!(config, Ok(StoreConfig { bus_capacity: 64, log_actions: true }));
        assert_eq!(
            invalid,
            Err(ConfigError::InvalidEnv { var: ENV_BUS_CAPACITY, value: "lots".into() })
        );
    }

    #[test]
    fn test_logged_actions_store_behaves_the_same() {
        init_tracing();
        let store = Store::builder(ModuleMap::new().with("fooModule", foo_module()))
            .config(StoreConfig::default().with_log_actions(true).with_bus_capacity(8))
            .build()
            .unwrap();

        for n in 0..20 {
            store.dispatch(Action::with_payload(FOO, n)).unwrap();
        }
        let state = store.get_module_state("fooModule").unwrap();
        assert_eq!(state.as_array().map(Vec::len), Some(22));
    }

    // =============================================================================
    // TEARDOWN
    // =============================================================================

    fn ticking_modules(token: Arc<()>) -> ModuleMap {
        let ticker = effects_fn(move |dispatch, _| {
            let token = token.clone();
            Ok(vec![dispatch
                .filter_action("@test/TICK")
                .map(move |_| {
                    let _held = &token;
                    Action::new("@test/TOCK")
                })
                .into_effect()])
        });
        ModuleMap::new().with(
            "tickModule",
            ModuleDef::declared(|state: Option<&State>, _: &Action| Ok(or_default(state, || json!(0))), vec![ticker]),
        )
    }

    /// Wait until only `holders` references to `token` remain.
    async fn released(token: &Arc<()>, holders: usize) -> bool {
        tokio::time::timeout(SETTLE, async {
            while Arc::strong_count(token) > holders {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test]
    async fn test_shutdown_releases_effects() -> anyhow::Result<()> {
        init_tracing();
        let token = Arc::new(());
        let store = Store::builder(ticking_modules(token.clone())).build()?;
        assert_eq!(store.effect_subscription_count(), 1);

        // The test and the registered producer keep their references.
        store.shutdown();
        assert!(released(&token, 2).await);
        assert_eq!(store.dispatch(Action::new("@test/TICK")).err(), Some(StoreError::ShutDown));
        assert!(store.get_state_stream("tickModule").is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_dropping_last_handle_releases_effects() -> anyhow::Result<()> {
        init_tracing();
        let token = Arc::new(());
        let store = Store::builder(ticking_modules(token.clone())).build()?;
        let clone = store.clone();

        drop(store);
        clone.dispatch(Action::new("@test/TICK"))?;
        drop(clone);

        assert!(released(&token, 1).await);
        Ok(())
    }
}
