//! The value model shared by every layer of the store.

use serde_json::Value;

/// A state snapshot or partial update: property name to JSON value.
///
/// The underlying store owns the only authoritative copy; everything in this
/// crate reads cloned snapshots and writes merged partials. Built with
/// `preserve_order`, so iteration follows insertion order and diagnostic
/// output stays stable.
pub type State = serde_json::Map<String, Value>;

/// Shallow-merge `src` into `dst`, overwriting colliding keys.
pub(crate) fn merge(dst: &mut State, src: &State) {
    for (key, value) in src {
        dst.insert(key.clone(), value.clone());
    }
}

/// Build a [`State`] partial from `"key" => value` pairs.
///
/// Values go through [`serde_json::json!`], so anything serializable works:
///
/// ```
/// use state_flow::state;
///
/// let partial = state! { "count" => 1, "label" => "ready" };
/// assert_eq!(partial.len(), 2);
/// ```
#[macro_export]
macro_rules! state {
    () => { $crate::State::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut partial = $crate::State::new();
        $( partial.insert(($key).into(), $crate::json!($value)); )+
        partial
    }};
}
