//! Accessor facade behavior: reads, subscriptions, backend pass-through.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use state_flow::{
    json, state, Listener, MemoryBackend, State, StateBackend, Store, SubscriberId, Value,
};

#[test]
fn batch_read_is_positional() {
    let store = Store::new(state! { "a" => 1, "b" => 2 });
    assert_eq!(store.get_many("a, b"), vec![json!(1), json!(2)]);
    assert_eq!(store.get_many("b,a"), vec![json!(2), json!(1)]);
    // Re-reading with unchanged values yields an equal tuple.
    assert_eq!(store.get_many("a, b"), store.get_many("a, b"));
}

#[test]
fn batch_read_resolves_each_name_independently() {
    let store = Store::new(state! { "a" => 1 });
    assert_eq!(
        store.get_many(" a , missing "),
        vec![json!(1), Value::Null]
    );
}

#[test]
fn subscribe_keys_filters_by_tuple_equality() {
    let notified: Arc<Mutex<Vec<Vec<Value>>>> = Arc::new(Mutex::new(Vec::new()));
    let notified2 = notified.clone();
    let store = Store::new(state! { "a" => 1, "b" => 2, "c" => 3 });
    let _sub = store.subscribe_keys("a, b", move |values| {
        notified2.lock().push(values.to_vec());
    });

    // Unrelated key: tuple unchanged, no notification.
    store.write(state! { "c" => 30 }).unwrap();
    assert!(notified.lock().is_empty());

    // Same values rewritten: tuple unchanged, no notification.
    store.write(state! { "a" => 1 }).unwrap();
    assert!(notified.lock().is_empty());

    // A requested key changes: one notification with the fresh tuple.
    store.write(state! { "b" => 20 }).unwrap();
    assert_eq!(*notified.lock(), vec![vec![json!(1), json!(20)]]);
}

#[test]
fn subscribe_selection_with_custom_equality() {
    let notified: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let notified2 = notified.clone();
    let store = Store::new(state! { "name" => "ada" });
    let _sub = store.subscribe_selection_with(
        |state: &State| {
            state
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        },
        // Case-insensitive: a change of casing alone is not a change.
        |a: &String, b: &String| a.eq_ignore_ascii_case(b),
        move |name: &String| notified2.lock().push(name.clone()),
    );

    store.write(state! { "name" => "ADA" }).unwrap();
    assert!(notified.lock().is_empty());

    store.write(state! { "name" => "Grace" }).unwrap();
    assert_eq!(*notified.lock(), vec!["Grace".to_string()]);
}

#[test]
fn destroy_drops_subscriptions_but_not_the_store() {
    let count = Arc::new(Mutex::new(0usize));
    let count2 = count.clone();
    let store = Store::new(state! { "a" => 0 });
    let sub = store.subscribe(move |_, _| *count2.lock() += 1);

    store.write(state! { "a" => 1 }).unwrap();
    store.destroy();
    store.write(state! { "a" => 2 }).unwrap();

    assert_eq!(*count.lock(), 1);
    // Reads and writes keep working after destroy.
    assert_eq!(store.get("a"), json!(2));
    sub.detach();
}

#[test]
fn write_with_resolves_against_current_state() {
    let store = Store::new(state! { "count" => 1 });
    store
        .write_with(|state| {
            state! { "count" => state.get("count").and_then(Value::as_i64).unwrap_or(0) + 1 }
        })
        .unwrap();
    store
        .write_with(|state| {
            state! { "count" => state.get("count").and_then(Value::as_i64).unwrap_or(0) + 1 }
        })
        .unwrap();
    assert_eq!(store.get("count"), json!(3));
}

/// Counts native writes to verify the one-commit-per-cycle contract against
/// an injected external primitive.
struct CountingBackend {
    inner: MemoryBackend,
    applies: AtomicUsize,
}

impl CountingBackend {
    fn new(initial: State) -> Self {
        Self {
            inner: MemoryBackend::new(initial),
            applies: AtomicUsize::new(0),
        }
    }
}

impl StateBackend for CountingBackend {
    fn snapshot(&self) -> State {
        self.inner.snapshot()
    }

    fn apply(&self, partial: &State) {
        self.applies.fetch_add(1, Ordering::Relaxed);
        self.inner.apply(partial);
    }

    fn subscribe(&self, listener: Listener) -> SubscriberId {
        self.inner.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.inner.unsubscribe(id);
    }

    fn destroy(&self) {
        self.inner.destroy();
    }
}

#[test]
fn injected_backend_sees_exactly_one_commit_per_write() {
    use state_flow::{Computed, StateView};

    let backend = Arc::new(CountingBackend::new(state! { "first" => "Ada" }));
    let store = Store::builder(state! { "last" => "Lovelace" })
        .backend(backend.clone())
        .computed(
            "full",
            Computed::new(["first", "last"], |s: &StateView| {
                json!(format!(
                    "{} {}",
                    s.get("first").as_str().unwrap_or(""),
                    s.get("last").as_str().unwrap_or("")
                ))
            }),
        )
        .build();

    // Construction: one apply for the seeded initial state, one for the
    // staged computed values.
    assert_eq!(backend.applies.load(Ordering::Relaxed), 2);
    assert_eq!(store.get("full"), json!("Ada Lovelace"));

    // Each write cycle commits once, recomputation included.
    store.write(state! { "first" => "Grace" }).unwrap();
    assert_eq!(backend.applies.load(Ordering::Relaxed), 3);
    assert_eq!(store.get("full"), json!("Grace Lovelace"));
}

#[test]
fn store_clones_share_state() {
    let store = Store::new(state! { "a" => 1 });
    let clone = store.clone();
    clone.write(state! { "a" => 2 }).unwrap();
    assert_eq!(store.get("a"), json!(2));
}
