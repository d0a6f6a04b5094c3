//! The write interceptor and middleware pipeline.
//!
//! Every mutation flows through one composed write function. The backend's
//! native write is captured once at store construction and never exposed, so
//! computed and watcher semantics cannot be bypassed.
//!
//! One write cycle, in order:
//!
//! 1. resolve the explicit partial (a map, or a function of the current
//!    snapshot)
//! 2. decide whether this cycle is traced
//! 3. trace group start, previous state (`All` only), and the changes
//! 4. ask the computed graph which entries the changes make stale and
//!    recompute them against the merged pre-commit snapshot
//! 5. trace the recomputed values if any
//! 6. shallow-merge changes and recomputed values (recomputed wins)
//! 7. commit the merged partial to the backend in a single write
//! 8. dispatch watchers for every committed property
//! 9. trace the new state (`All` only) and close the group
//!
//! Middleware stages wrap the core write left-to-right: the first listed
//! stage is outermost. A stage may inspect, transform, or short-circuit the
//! call to the next stage; failures propagate unless a stage catches them,
//! and nothing commits if a failure happens before step 7.

use std::sync::Arc;

use serde_json::Value;

use crate::backend::StateBackend;
use crate::computed::ComputedGraph;
use crate::config::{LogLevel, Settings};
use crate::error::StoreError;
use crate::tracer::WriteTracer;
use crate::value::{merge, State};
use crate::watcher::WatcherSet;

/// A pending mutation: either a partial map, or a function producing one
/// from the pre-write snapshot.
#[derive(Clone)]
pub enum Update {
    /// Explicit partial changes.
    Partial(State),
    /// Changes computed from the current state.
    With(Arc<dyn Fn(&State) -> State + Send + Sync>),
}

impl std::fmt::Debug for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Update::Partial(state) => f.debug_tuple("Partial").field(state).finish(),
            Update::With(_) => f.debug_tuple("With").field(&"<fn>").finish(),
        }
    }
}

impl Update {
    /// An update computed from the current state at write time.
    pub fn with(f: impl Fn(&State) -> State + Send + Sync + 'static) -> Self {
        Update::With(Arc::new(f))
    }

    /// Resolve this update against the pre-write snapshot.
    pub fn resolve(&self, current: &State) -> State {
        match self {
            Update::Partial(partial) => partial.clone(),
            Update::With(f) => f(current),
        }
    }
}

impl From<State> for Update {
    fn from(partial: State) -> Self {
        Update::Partial(partial)
    }
}

impl TryFrom<Value> for Update {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(Update::Partial(map)),
            other => Err(StoreError::InvalidUpdate {
                found: json_kind(&other),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Per-call write options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Suppress tracing for this one call regardless of the configured level.
    pub exclude_from_log: bool,
}

impl WriteOptions {
    /// Options with `exclude_from_log` set.
    pub fn excluded() -> Self {
        Self {
            exclude_from_log: true,
        }
    }
}

/// The composed write function type every middleware stage wraps.
pub type WriteFn = Arc<dyn Fn(Update, WriteOptions) -> Result<(), StoreError> + Send + Sync>;

/// Read accessors handed to middleware stages.
#[derive(Clone)]
pub struct StoreReader {
    backend: Arc<dyn StateBackend>,
}

impl StoreReader {
    /// Clone the current full state.
    pub fn state(&self) -> State {
        self.backend.snapshot()
    }

    /// Read one property; absent names read as [`Value::Null`].
    pub fn get(&self, name: &str) -> Value {
        self.backend
            .snapshot()
            .get(name)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// A composable wrapper around the write path.
///
/// Each stage receives the next stage's write function plus read accessors
/// and returns a replacement write function. Stages compose left-to-right:
/// with stages `[m1, m2]`, a write runs `m1(m2(core))`.
///
/// Closures of the exact shape work directly; see [`from_fn`] for a variant
/// with better type inference.
pub trait Middleware: Send + Sync + 'static {
    /// Wrap `next`, returning the replacement write function.
    fn wrap(&self, next: WriteFn, reader: StoreReader) -> WriteFn;
}

impl<F> Middleware for F
where
    F: Fn(WriteFn, StoreReader) -> WriteFn + Send + Sync + 'static,
{
    fn wrap(&self, next: WriteFn, reader: StoreReader) -> WriteFn {
        self(next, reader)
    }
}

/// Build a middleware stage from a closure, guiding closure type inference:
///
/// ```
/// use std::sync::Arc;
/// use state_flow::{middleware::from_fn, state, Store};
///
/// let stage = from_fn(|next, _reader| {
///     Arc::new(move |update, options| {
///         // inspect or transform here
///         next(update, options)
///     })
/// });
/// let store = Store::builder(state! { "a" => 1 }).middleware(stage).build();
/// store.write(state! { "a" => 2 }).unwrap();
/// ```
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(WriteFn, StoreReader) -> WriteFn + Send + Sync + 'static,
{
    f
}

/// Shared innards of a store: the captured backend and the registries the
/// pipeline consults. Constructed once, immutable afterwards.
pub(crate) struct StoreCore {
    pub(crate) backend: Arc<dyn StateBackend>,
    pub(crate) computed: ComputedGraph,
    pub(crate) watchers: WatcherSet,
    pub(crate) settings: Settings,
    pub(crate) tracer: Arc<dyn WriteTracer>,
}

/// Compose the middleware stages around the core write function.
pub(crate) fn compose(core: Arc<StoreCore>, stages: &[Box<dyn Middleware>]) -> WriteFn {
    let reader = StoreReader {
        backend: core.backend.clone(),
    };
    let mut write = core_write(core);
    for stage in stages.iter().rev() {
        write = stage.wrap(write, reader.clone());
    }
    write
}

/// The core write cycle (steps 1-9 above) against the captured backend.
fn core_write(core: Arc<StoreCore>) -> WriteFn {
    Arc::new(move |update: Update, options: WriteOptions| {
        let previous = core.backend.snapshot();
        let changes = update.resolve(&previous);

        let traced = !options.exclude_from_log && core.settings.log_level != LogLevel::None;
        let verbose = core.settings.log_level == LogLevel::All;
        if traced {
            core.tracer.on_cycle_start(&core.settings.name);
            if verbose {
                core.tracer.on_previous_state(&previous);
            }
            core.tracer.on_changes(&changes);
        }

        let mut base = previous.clone();
        merge(&mut base, &changes);
        let recomputed = core.computed.recompute(&changes, &base);
        if traced && !recomputed.is_empty() {
            core.tracer.on_recomputed(&recomputed);
        }

        // Recomputed keys win on collision with explicit changes.
        let mut committed = changes;
        merge(&mut committed, &recomputed);
        core.backend.apply(&committed);

        // Watchers observe the fully-settled post-commit state.
        let mut settled = base;
        merge(&mut settled, &recomputed);
        core.watchers.dispatch(&committed, &settled, &previous)?;

        if traced {
            if verbose {
                core.tracer.on_new_state(&settled);
            }
            core.tracer.on_cycle_end();
        }
        Ok(())
    })
}
