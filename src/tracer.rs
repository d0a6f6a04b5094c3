//! Tracer hooks for observing write cycles.
//!
//! The write pipeline reports each cycle through a [`WriteTracer`]. Which
//! hooks fire is decided by the configured
//! [`LogLevel`](crate::LogLevel) and the per-call
//! [`WriteOptions`](crate::WriteOptions), not by the tracer itself:
//!
//! - cycle start and end, and the applied changes, at `Diff` and above
//! - recomputed values, when any, at `Diff` and above
//! - previous and new full state only at `All`
//!
//! [`ConsoleTracer`] renders an ordered, human-readable stderr trace
//! (advisory output only, never a machine-parsed contract).
//! [`EventCollector`] records events for tests and assertions.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::value::State;

/// Observer of write cycles.
///
/// All methods have default empty implementations, so implementations only
/// override the events they care about. Hooks for one cycle always arrive in
/// order: start, previous state, changes, recomputed, new state, end.
/// The exception is a failing watcher dispatch, which aborts the cycle
/// before the final two hooks and leaves the trace group open.
///
/// A reentrant write (issued from a watcher reaction) nests its complete
/// hook sequence between the outer cycle's `on_recomputed` and
/// `on_new_state`.
pub trait WriteTracer: Send + Sync + 'static {
    /// A write cycle with tracing enabled has started.
    #[inline]
    fn on_cycle_start(&self, _store: &str) {}

    /// Full state before the write. Emitted at `All` only.
    #[inline]
    fn on_previous_state(&self, _state: &State) {}

    /// The resolved explicit partial of this write.
    #[inline]
    fn on_changes(&self, _changes: &State) {}

    /// Values recomputed by the computed graph. Emitted only when non-empty.
    #[inline]
    fn on_recomputed(&self, _recomputed: &State) {}

    /// Full state after the commit settled. Emitted at `All` only.
    #[inline]
    fn on_new_state(&self, _state: &State) {}

    /// The write cycle completed.
    #[inline]
    fn on_cycle_end(&self) {}
}

/// Tracer that discards all events.
pub struct NoopTracer;

impl WriteTracer for NoopTracer {}

/// Tracer printing an indented, ordered trace of each cycle to stderr.
///
/// Nested cycles indent one level deeper, mirroring their position on the
/// call stack.
pub struct ConsoleTracer {
    depth: AtomicUsize,
}

impl ConsoleTracer {
    /// Create a console tracer at depth zero.
    pub fn new() -> Self {
        Self {
            depth: AtomicUsize::new(0),
        }
    }

    fn line(&self, label: &str, state: &State) {
        let indent = "  ".repeat(self.depth.load(Ordering::Relaxed));
        eprintln!("{indent}{label}: {}", Value::Object(state.clone()));
    }
}

impl Default for ConsoleTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteTracer for ConsoleTracer {
    fn on_cycle_start(&self, store: &str) {
        let depth = self.depth.fetch_add(1, Ordering::Relaxed);
        eprintln!("{}@ {store}", "  ".repeat(depth));
    }

    fn on_previous_state(&self, state: &State) {
        self.line("prev state", state);
    }

    fn on_changes(&self, changes: &State) {
        self.line("changes", changes);
    }

    fn on_recomputed(&self, recomputed: &State) {
        self.line("computed", recomputed);
    }

    fn on_new_state(&self, state: &State) {
        self.line("new state", state);
    }

    fn on_cycle_end(&self) {
        self.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

/// One recorded tracer event.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteEvent {
    /// Cycle started for the named store.
    CycleStart {
        /// Store label from settings.
        store: String,
    },
    /// Pre-write full state.
    PreviousState(State),
    /// Resolved explicit partial.
    Changes(State),
    /// Recomputed values.
    Recomputed(State),
    /// Post-commit full state.
    NewState(State),
    /// Cycle completed.
    CycleEnd,
}

/// Tracer that records every event, for tests.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use state_flow::{state, EventCollector, LogLevel, Store, WriteEvent};
///
/// let collector = Arc::new(EventCollector::new());
/// let store = Store::builder(state! { "a" => 1 })
///     .log_level(LogLevel::Diff)
///     .tracer(collector.clone())
///     .build();
/// store.write(state! { "a" => 2 }).unwrap();
/// assert!(matches!(collector.events()[0], WriteEvent::CycleStart { .. }));
/// ```
pub struct EventCollector {
    events: Mutex<Vec<WriteEvent>>,
}

impl EventCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<WriteEvent> {
        self.events.lock().clone()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: WriteEvent) {
        self.events.lock().push(event);
    }
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteTracer for EventCollector {
    fn on_cycle_start(&self, store: &str) {
        self.push(WriteEvent::CycleStart {
            store: store.to_string(),
        });
    }

    fn on_previous_state(&self, state: &State) {
        self.push(WriteEvent::PreviousState(state.clone()));
    }

    fn on_changes(&self, changes: &State) {
        self.push(WriteEvent::Changes(changes.clone()));
    }

    fn on_recomputed(&self, recomputed: &State) {
        self.push(WriteEvent::Recomputed(recomputed.clone()));
    }

    fn on_new_state(&self, state: &State) {
        self.push(WriteEvent::NewState(state.clone()));
    }

    fn on_cycle_end(&self) {
        self.push(WriteEvent::CycleEnd);
    }
}
