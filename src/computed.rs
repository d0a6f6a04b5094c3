//! The computed graph engine.
//!
//! Owns the registry of derived properties and their dependency sets, plus a
//! dependency index deciding which entries a given write makes stale. Entries
//! live in registration order, and every recompute pass walks them in that
//! order, so a later entry's derivation observes values recomputed earlier in
//! the same pass (one level of computed-on-computed chaining per write).
//!
//! There is no cycle detection and no fixed-point iteration: an entry that
//! depends on an entry registered after itself observes that entry's previous
//! value for the cycle.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::extract::{self, DeriveFn, StateView};
use crate::value::State;

/// Configuration of one computed property.
///
/// The derivation is a plain function over a [`StateView`]; it must be pure
/// with respect to state (same view, same value). Dependencies either come
/// declared up front ([`Computed::new`], the recommended form) or are
/// inferred by a one-shot probe evaluation ([`Computed::inferred`], see the
/// [`extract`](crate::extract) module for the probe's blind spots).
pub struct Computed {
    deps: DepSpec,
    derive: DeriveFn,
}

enum DepSpec {
    Declared(Vec<String>),
    Inferred,
}

impl Computed {
    /// A computed property with an explicitly declared dependency set.
    ///
    /// Names are trimmed and deduplicated, first occurrence preserved. An
    /// empty set makes the entry a one-shot static value: computed once at
    /// registration and never again.
    pub fn new(
        deps: impl IntoIterator<Item = impl Into<String>>,
        derive: impl Fn(&StateView<'_>) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            deps: DepSpec::Declared(extract::declared(deps)),
            derive: Arc::new(derive),
        }
    }

    /// A computed property whose dependency set is inferred by running the
    /// derivation once against the registration-time snapshot.
    pub fn inferred(derive: impl Fn(&StateView<'_>) -> Value + Send + Sync + 'static) -> Self {
        Self {
            deps: DepSpec::Inferred,
            derive: Arc::new(derive),
        }
    }
}

struct Entry {
    name: String,
    deps: Vec<String>,
    derive: DeriveFn,
}

/// Registry of live computed entries and their dependency index.
pub(crate) struct ComputedGraph {
    /// Entries in registration order.
    entries: Vec<Entry>,
    /// Dependency name to indices of entries reading it.
    by_dep: HashMap<String, Vec<usize>, ahash::RandomState>,
}

impl ComputedGraph {
    /// Register a batch of computed definitions against `snapshot`.
    ///
    /// Each definition is evaluated once against the snapshot merged with the
    /// values already staged earlier in this same pass, so registration order
    /// matters for intra-batch chaining. Entries with an empty dependency set
    /// are staged but not registered; they never recompute.
    ///
    /// Returns the graph and the staged initial values; the caller commits
    /// the staged map in one write if it is non-empty.
    pub(crate) fn register(defs: IndexMap<String, Computed>, snapshot: &State) -> (Self, State) {
        let mut entries = Vec::new();
        let mut by_dep: HashMap<String, Vec<usize>, ahash::RandomState> = HashMap::default();
        let mut staged = State::new();
        let mut base = snapshot.clone();

        for (name, def) in defs {
            let (deps, value) = match def.deps {
                DepSpec::Inferred => extract::probe(&def.derive, &base),
                DepSpec::Declared(deps) => {
                    let value = (def.derive)(&StateView::new(&base));
                    (deps, value)
                }
            };
            base.insert(name.clone(), value.clone());
            staged.insert(name.clone(), value);

            if deps.is_empty() {
                // One-shot static value; stays out of the live registry.
                continue;
            }
            let index = entries.len();
            for dep in &deps {
                by_dep.entry(dep.clone()).or_default().push(index);
            }
            entries.push(Entry {
                name,
                deps,
                derive: def.derive,
            });
        }

        (Self { entries, by_dep }, staged)
    }

    /// Recompute every entry whose dependency set intersects the keys of
    /// `changes`, against `base` (the pre-commit snapshot with the explicit
    /// partial already merged).
    ///
    /// Each stale entry is evaluated exactly once, in registration order,
    /// with earlier results of the same pass visible to later entries.
    /// Returns the recompute map only; merging and committing are the
    /// caller's responsibility.
    pub(crate) fn recompute(&self, changes: &State, base: &State) -> State {
        let mut stale = BTreeSet::new();
        for key in changes.keys() {
            if let Some(indices) = self.by_dep.get(key) {
                stale.extend(indices.iter().copied());
            }
        }

        let mut recomputed = State::new();
        if stale.is_empty() {
            return recomputed;
        }

        let mut scratch = base.clone();
        for index in stale {
            let entry = &self.entries[index];
            let value = (entry.derive)(&StateView::new(&scratch));
            scratch.insert(entry.name.clone(), value.clone());
            recomputed.insert(entry.name.clone(), value);
        }
        recomputed
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared dependency names of a registered entry, for inspection.
    #[cfg(test)]
    fn deps_of(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.deps.as_slice())
    }
}
