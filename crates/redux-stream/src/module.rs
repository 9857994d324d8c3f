//! # Module Definitions
//!
//! A module is a named reducer plus optional effects producers. Callers
//! describe modules with [`ModuleDef`]; the store normalizes every entry once,
//! at construction, into a [`ModuleRecord`] with the hydrate/clear adapter
//! already applied.

use crate::adapter::module_reducer;
use crate::effects::EffectContext;
use redux_stream_bus::{ActionSource, Effect};
use redux_stream_types::{Action, EffectError, ReducerError, State, StoreError};
use std::collections::HashSet;
use std::sync::Arc;

/// Pure state transition. `None` means "not initialized yet": return the default.
///
/// Returning the same `Arc` that was passed in signals "no change".
pub type Reducer =
    Arc<dyn Fn(Option<&State>, &Action) -> Result<State, ReducerError> + Send + Sync>;

/// Invoked once at store construction; returns the module's effect streams.
pub type EffectsFn =
    Arc<dyn Fn(&ActionSource, &EffectContext) -> Result<Vec<Effect>, EffectError> + Send + Sync>;

/// Wrap a closure as a [`Reducer`].
pub fn reducer<F>(f: F) -> Reducer
where
    F: Fn(Option<&State>, &Action) -> Result<State, ReducerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as an [`EffectsFn`].
pub fn effects_fn<F>(f: F) -> EffectsFn
where
    F: Fn(&ActionSource, &EffectContext) -> Result<Vec<Effect>, EffectError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// User-facing module description.
#[derive(Clone)]
pub enum ModuleDef {
    /// A reducer without effects.
    Bare(Reducer),
    /// A reducer with zero or more effects producers.
    Declared {
        reducer: Reducer,
        effects: Vec<EffectsFn>,
    },
}

impl ModuleDef {
    /// A module made of a reducer only.
    pub fn bare<F>(f: F) -> Self
    where
        F: Fn(Option<&State>, &Action) -> Result<State, ReducerError> + Send + Sync + 'static,
    {
        Self::Bare(reducer(f))
    }

    /// A module with a reducer and effects producers.
    pub fn declared<F>(f: F, effects: Vec<EffectsFn>) -> Self
    where
        F: Fn(Option<&State>, &Action) -> Result<State, ReducerError> + Send + Sync + 'static,
    {
        Self::Declared {
            reducer: reducer(f),
            effects,
        }
    }

    /// Number of effects producers.
    #[must_use]
    pub fn effects_len(&self) -> usize {
        match self {
            Self::Bare(_) => 0,
            Self::Declared { effects, .. } => effects.len(),
        }
    }
}

/// Builder returned by [`combine_effects`].
pub struct CombinedEffects {
    effects: Vec<EffectsFn>,
}

impl CombinedEffects {
    /// Attach the reducer, yielding a declared module.
    pub fn with_reducer<F>(self, f: F) -> ModuleDef
    where
        F: Fn(Option<&State>, &Action) -> Result<State, ReducerError> + Send + Sync + 'static,
    {
        ModuleDef::declared(f, self.effects)
    }
}

/// `combine_effects([a, b]).with_reducer(r)` is the same as
/// `ModuleDef::declared(r, vec![a, b])`.
pub fn combine_effects<I>(producers: I) -> CombinedEffects
where
    I: IntoIterator<Item = EffectsFn>,
{
    CombinedEffects {
        effects: producers.into_iter().collect(),
    }
}

/// Named modules in registration order.
#[derive(Clone, Default)]
pub struct ModuleMap {
    entries: Vec<(String, ModuleDef)>,
}

impl ModuleMap {
    /// Create an empty module map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module (builder style).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, module: ModuleDef) -> Self {
        self.insert(name, module);
        self
    }

    /// Add a module.
    pub fn insert(&mut self, name: impl Into<String>, module: ModuleDef) {
        self.entries.push((name.into(), module));
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no module has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry into its normalized record.
    pub(crate) fn normalize(self) -> Result<Vec<ModuleRecord>, StoreError> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        let mut records = Vec::with_capacity(self.entries.len());

        for (name, module) in self.entries {
            if !seen.insert(name.clone()) {
                return Err(StoreError::DuplicateModule(name));
            }

            let (inner, effects) = match module {
                ModuleDef::Bare(reducer) => (reducer, Vec::new()),
                ModuleDef::Declared { reducer, effects } => (reducer, effects),
            };

            records.push(ModuleRecord {
                reducer: module_reducer(&name, inner),
                name,
                effects,
            });
        }

        Ok(records)
    }
}

impl<S: Into<String>> FromIterator<(S, ModuleDef)> for ModuleMap {
    fn from_iter<I: IntoIterator<Item = (S, ModuleDef)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, module) in iter {
            map.insert(name, module);
        }
        map
    }
}

/// Normalized module: adapted reducer plus its effects producers.
pub(crate) struct ModuleRecord {
    pub(crate) name: String,
    pub(crate) reducer: Reducer,
    pub(crate) effects: Vec<EffectsFn>,
}
