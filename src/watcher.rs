//! The watcher dispatcher.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::StoreError;
use crate::value::State;

/// Reaction invoked with `(new, old)` values of the watched property.
pub(crate) type Reaction = Arc<dyn Fn(&Value, &Value) -> anyhow::Result<()> + Send + Sync>;

/// Registry mapping property name to reaction, iterated in insertion order.
///
/// Watchers are not dependency-tracked: a reaction fires on an exact name
/// match whenever its property appears in a committed write, whether the
/// property is plain or computed and whether or not the value changed.
pub(crate) struct WatcherSet {
    reactions: IndexMap<String, Reaction>,
}

impl WatcherSet {
    pub(crate) fn new(reactions: IndexMap<String, Reaction>) -> Self {
        Self { reactions }
    }

    /// Invoke, in registry order, the reaction of every property present in
    /// `committed`, with the settled post-commit and pre-commit values.
    ///
    /// A failing reaction propagates immediately; reactions after it in the
    /// same pass do not run, and the already-committed write stands.
    pub(crate) fn dispatch(
        &self,
        committed: &State,
        new_state: &State,
        old_state: &State,
    ) -> Result<(), StoreError> {
        for (name, reaction) in &self.reactions {
            if !committed.contains_key(name) {
                continue;
            }
            let new = new_state.get(name).cloned().unwrap_or(Value::Null);
            let old = old_state.get(name).cloned().unwrap_or(Value::Null);
            reaction(&new, &old).map_err(|error| StoreError::Watcher {
                property: name.clone(),
                error,
            })?;
        }
        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }
}
