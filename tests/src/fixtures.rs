//! # Test Fixtures
//!
//! Shared helpers for the integration scenarios.

use anyhow::Context;
use parking_lot::Mutex;
use redux_stream::{State, StateStream, Subscription};
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

/// Upper bound for effect feedback to settle.
pub const SETTLE: Duration = Duration::from_secs(2);

/// Install a test-writer subscriber once per process. `RUST_LOG` overrides
/// the default `warn` filter.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// `state` if initialized, otherwise a fresh `default`.
pub fn or_default(state: Option<&State>, default: impl FnOnce() -> Value) -> State {
    state.cloned().unwrap_or_else(|| Arc::new(default()))
}

/// Copy of `state` with `value` appended to the array at `field`, or to the
/// state itself when `field` is `None`.
pub fn appended(state: &Value, field: Option<&str>, value: Value) -> State {
    let mut next = state.clone();
    let target = match field {
        Some(field) => next.get_mut(field),
        None => Some(&mut next),
    };
    if let Some(Value::Array(items)) = target {
        items.push(value);
    }
    Arc::new(next)
}

/// Payload as an integer, `0` when absent or not a number.
pub fn payload_i64(payload: &Value) -> i64 {
    payload.as_i64().unwrap_or_default()
}

/// Records every value a state stream delivers.
pub struct Recorder {
    values: Arc<Mutex<Vec<Value>>>,
    subscription: Option<Subscription>,
}

impl Recorder {
    pub fn follow(stream: &StateStream<State>) -> Self {
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = values.clone();
        let subscription = stream.subscribe(move |state: &State| sink.lock().push((**state).clone()));
        Self {
            values,
            subscription: Some(subscription),
        }
    }

    /// Latest delivered value.
    pub fn last(&self) -> Value {
        self.values.lock().last().cloned().unwrap_or(Value::Null)
    }

    pub fn history(&self) -> Vec<Value> {
        self.values.lock().clone()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

/// Wait until `stream` holds `expected`.
pub async fn settle(stream: &StateStream<State>, expected: &Value) -> anyhow::Result<()> {
    timeout(SETTLE, stream.wait_for(|state| **state == *expected))
        .await
        .with_context(|| format!("{} never reached {expected}", stream.module()))?
        .context("state stream closed")?;
    Ok(())
}
