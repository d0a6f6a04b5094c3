//! The public store facade and its builder.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::backend::{MemoryBackend, StateBackend, SubscriberId};
use crate::computed::{Computed, ComputedGraph};
use crate::config::{LogLevel, Settings};
use crate::error::StoreError;
use crate::middleware::{self, Middleware, StoreCore, Update, WriteFn, WriteOptions};
use crate::tracer::{ConsoleTracer, WriteTracer};
use crate::value::State;
use crate::watcher::{Reaction, WatcherSet};

/// The read/write surface over the reactive layer.
///
/// Cheap to clone; all innards are behind `Arc`. Every write routes through
/// the composed middleware pipeline, so computed recomputation and watcher
/// dispatch cannot be bypassed.
///
/// # Example
///
/// ```
/// use state_flow::{state, Store};
///
/// let store = Store::new(state! { "count" => 0 });
/// store.write(state! { "count" => 1 }).unwrap();
/// assert_eq!(store.get("count"), state_flow::json!(1));
/// ```
#[derive(Clone)]
pub struct Store {
    core: Arc<StoreCore>,
    write: WriteFn,
}

impl Store {
    /// Create a store over the in-memory backend with no addons.
    pub fn new(initial: State) -> Self {
        Self::builder(initial).build()
    }

    /// Create a builder for configuring computed properties, watchers,
    /// middleware, and settings.
    pub fn builder(initial: State) -> StoreBuilder {
        StoreBuilder::new(initial)
    }

    /// Clone the current full state.
    pub fn state(&self) -> State {
        self.core.backend.snapshot()
    }

    /// Read one property by exact name; absent names read as
    /// [`Value::Null`].
    pub fn get(&self, name: &str) -> Value {
        self.state().get(name).cloned().unwrap_or(Value::Null)
    }

    /// Batch read by comma-separated name list.
    ///
    /// Names are split on `,` and trimmed; each resolves independently and
    /// the result is positional:
    ///
    /// ```
    /// use state_flow::{json, state, Store};
    ///
    /// let store = Store::new(state! { "a" => 1, "b" => 2 });
    /// assert_eq!(store.get_many("a, b"), vec![json!(1), json!(2)]);
    /// ```
    pub fn get_many(&self, names: &str) -> Vec<Value> {
        let state = self.state();
        split_names(names)
            .map(|name| state.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// One-shot selector read over the current snapshot.
    pub fn select<T>(&self, selector: impl FnOnce(&State) -> T) -> T {
        selector(&self.state())
    }

    /// Write a partial update through the pipeline.
    pub fn write(&self, partial: State) -> Result<(), StoreError> {
        (self.write)(Update::Partial(partial), WriteOptions::default())
    }

    /// Write changes computed from the current state.
    pub fn write_with(
        &self,
        f: impl Fn(&State) -> State + Send + Sync + 'static,
    ) -> Result<(), StoreError> {
        (self.write)(Update::with(f), WriteOptions::default())
    }

    /// Write a JSON value that must be an object, or fail with
    /// [`StoreError::InvalidUpdate`].
    pub fn write_value(&self, value: Value) -> Result<(), StoreError> {
        (self.write)(Update::try_from(value)?, WriteOptions::default())
    }

    /// Write with per-call options.
    pub fn write_opts(
        &self,
        update: impl Into<Update>,
        options: WriteOptions,
    ) -> Result<(), StoreError> {
        (self.write)(update.into(), options)
    }

    /// Subscribe to every committed write with `(new, old)` snapshots.
    ///
    /// Pass-through to the backend's native subscription; dropping the
    /// returned guard unsubscribes.
    pub fn subscribe(
        &self,
        listener: impl Fn(&State, &State) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.core.backend.subscribe(Arc::new(listener));
        Subscription {
            backend: self.core.backend.clone(),
            id,
        }
    }

    /// Subscribe to a batch of properties given as a comma-separated name
    /// list, notified only when the resulting tuple changes.
    ///
    /// Change detection compares the whole tuple of resolved values, not
    /// each key individually; a write that leaves every requested value
    /// equal produces no notification.
    pub fn subscribe_keys(
        &self,
        names: &str,
        listener: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Subscription {
        let keys: Vec<String> = split_names(names).map(str::to_string).collect();
        self.subscribe_selection(
            move |state: &State| {
                keys.iter()
                    .map(|key| state.get(key).cloned().unwrap_or(Value::Null))
                    .collect::<Vec<Value>>()
            },
            move |values: &Vec<Value>| listener(values.as_slice()),
        )
    }

    /// Subscribe to an arbitrary projection of state, notified when the
    /// selected value changes by `PartialEq`.
    pub fn subscribe_selection<T>(
        &self,
        selector: impl Fn(&State) -> T + Send + Sync + 'static,
        listener: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription
    where
        T: Clone + PartialEq + Send + 'static,
    {
        self.subscribe_selection_with(selector, |a, b| a == b, listener)
    }

    /// Subscribe to an arbitrary projection of state with a custom equality
    /// function deciding whether the selection changed.
    pub fn subscribe_selection_with<T>(
        &self,
        selector: impl Fn(&State) -> T + Send + Sync + 'static,
        equals: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
        listener: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription
    where
        T: Clone + Send + 'static,
    {
        let last = Mutex::new(selector(&self.state()));
        self.subscribe(move |new, _old| {
            let selected = selector(new);
            let changed = {
                let mut last = last.lock();
                if equals(&last, &selected) {
                    false
                } else {
                    *last = selected.clone();
                    true
                }
            };
            // Lock released before user code so the listener may write back.
            if changed {
                listener(&selected);
            }
        })
    }

    /// Drop all backend subscriptions. Pass-through to the backend; state
    /// stays readable and writable.
    pub fn destroy(&self) {
        self.core.backend.destroy();
    }

    /// The settings this store was built with.
    pub fn settings(&self) -> &Settings {
        &self.core.settings
    }
}

fn split_names(names: &str) -> impl Iterator<Item = &str> {
    names.split(',').map(str::trim).filter(|name| !name.is_empty())
}

/// Guard for an active subscription; unsubscribes on drop.
pub struct Subscription {
    backend: Arc<dyn StateBackend>,
    id: SubscriberId,
}

impl Subscription {
    /// Keep the subscription alive for the lifetime of the backend.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.backend.unsubscribe(self.id);
    }
}

/// Typed configuration for a [`Store`].
///
/// The four addon sections (computed, watchers, middleware, settings) are
/// explicit fields with defaults; registering a computed property or watcher
/// under an already-used name replaces the earlier registration while
/// keeping its position in the registry.
pub struct StoreBuilder {
    initial: State,
    computed: IndexMap<String, Computed>,
    watchers: IndexMap<String, Reaction>,
    middleware: Vec<Box<dyn Middleware>>,
    settings: Settings,
    tracer: Arc<dyn WriteTracer>,
    backend: Option<Arc<dyn StateBackend>>,
}

impl StoreBuilder {
    fn new(initial: State) -> Self {
        Self {
            initial,
            computed: IndexMap::new(),
            watchers: IndexMap::new(),
            middleware: Vec::new(),
            settings: Settings::default(),
            tracer: Arc::new(ConsoleTracer::new()),
            backend: None,
        }
    }

    /// Register a computed property.
    pub fn computed(mut self, name: impl Into<String>, computed: Computed) -> Self {
        self.computed.insert(name.into(), computed);
        self
    }

    /// Register a watcher reaction for a property name.
    pub fn watcher(
        mut self,
        name: impl Into<String>,
        reaction: impl Fn(&Value, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.watchers.insert(name.into(), Arc::new(reaction));
        self
    }

    /// Append a middleware stage. Stages compose in the order added; the
    /// first is outermost.
    pub fn middleware(mut self, stage: impl Middleware) -> Self {
        self.middleware.push(Box::new(stage));
        self
    }

    /// Replace the whole settings block.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the store label used in trace group headers.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.settings.name = name.into();
        self
    }

    /// Set the diagnostic verbosity.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.settings.log_level = level;
        self
    }

    /// Replace the tracer receiving diagnostic events.
    pub fn tracer(mut self, tracer: Arc<dyn WriteTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Build over an external store primitive instead of the in-memory
    /// backend. A non-empty initial state is merged into it first.
    pub fn backend(mut self, backend: Arc<dyn StateBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Construct the store.
    ///
    /// Computed definitions are registered against the seeded snapshot and
    /// their initial values committed in one native write, before the
    /// pipeline exists; watchers do not fire for that initial commit.
    pub fn build(self) -> Store {
        let backend: Arc<dyn StateBackend> = match self.backend {
            Some(backend) => {
                if !self.initial.is_empty() {
                    backend.apply(&self.initial);
                }
                backend
            }
            None => Arc::new(MemoryBackend::new(self.initial)),
        };

        let (computed, staged) = ComputedGraph::register(self.computed, &backend.snapshot());
        if !staged.is_empty() {
            backend.apply(&staged);
        }

        let core = Arc::new(StoreCore {
            backend,
            computed,
            watchers: WatcherSet::new(self.watchers),
            settings: self.settings,
            tracer: self.tracer,
        });
        let write = middleware::compose(core.clone(), &self.middleware);
        Store { core, write }
    }
}
