//! Dependency extraction for computed properties.
//!
//! A computed property's dependency set is fixed at registration time.
//! It comes from one of two places:
//!
//! - an explicit declaration ([`Computed::new`](crate::Computed::new)),
//!   normalized by [`declared`], which is the primary model, or
//! - a one-shot *probe evaluation* ([`Computed::inferred`](crate::Computed::inferred)):
//!   the derivation runs once against a recording [`StateView`] and every key
//!   it reads is captured in first-read order.
//!
//! The probe is a best-effort scan, not a data-flow analysis: a key only read
//! on a branch not taken against the registration-time snapshot is never
//! recorded, and such an entry will not recompute when that key changes.
//! Declare dependencies explicitly when a derivation branches over state.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value;

use crate::value::State;

/// Read-only view of a state snapshot handed to derivation functions.
///
/// Absent properties read as [`Value::Null`].
pub struct StateView<'a> {
    state: &'a State,
    recorder: Option<&'a RefCell<IndexSet<String>>>,
}

impl<'a> StateView<'a> {
    pub(crate) fn new(state: &'a State) -> Self {
        Self {
            state,
            recorder: None,
        }
    }

    fn recording(state: &'a State, recorder: &'a RefCell<IndexSet<String>>) -> Self {
        Self {
            state,
            recorder: Some(recorder),
        }
    }

    /// Read a property, recording it as a dependency when probing.
    pub fn get(&self, name: &str) -> Value {
        self.record(name);
        self.state.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Whether the property is present. Counts as a read while probing.
    pub fn contains(&self, name: &str) -> bool {
        self.record(name);
        self.state.contains_key(name)
    }

    fn record(&self, name: &str) {
        if let Some(recorder) = self.recorder {
            recorder.borrow_mut().insert(name.to_string());
        }
    }
}

/// Derivation function of a computed property.
pub(crate) type DeriveFn = Arc<dyn Fn(&StateView<'_>) -> Value + Send + Sync>;

/// Run `derive` once against `snapshot`, recording every property it reads.
///
/// Returns the deduplicated read-set in first-read order together with the
/// produced value, which doubles as the entry's initial value.
pub(crate) fn probe(derive: &DeriveFn, snapshot: &State) -> (Vec<String>, Value) {
    let recorder = RefCell::new(IndexSet::new());
    let value = derive(&StateView::recording(snapshot, &recorder));
    (recorder.into_inner().into_iter().collect(), value)
}

/// Normalize an explicit dependency declaration: trim each name, drop empty
/// segments, deduplicate preserving first occurrence.
pub(crate) fn declared(names: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    let mut set = IndexSet::new();
    for name in names {
        let name = name.into();
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            set.insert(trimmed.to_string());
        }
    }
    set.into_iter().collect()
}
