//! Watcher dispatch behavior through the public store surface.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use state_flow::{json, state, Computed, StateView, Store, StoreError, Value};

type ChangeLog = Arc<Mutex<Vec<(Value, Value)>>>;

fn change_log() -> ChangeLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn fires_once_per_write_with_new_and_old() {
    let log = change_log();
    let log2 = log.clone();
    let store = Store::builder(state! { "count" => 0 })
        .watcher("count", move |new, old| {
            log2.lock().push((new.clone(), old.clone()));
            Ok(())
        })
        .build();

    store.write(state! { "count" => 1 }).unwrap();
    store.write(state! { "other" => true }).unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0], (json!(1), json!(0)));
}

#[test]
fn same_value_write_still_fires() {
    // Dispatch keys off presence in the committed write, not a value change.
    let log = change_log();
    let log2 = log.clone();
    let store = Store::builder(state! { "count" => 0 })
        .watcher("count", move |new, old| {
            log2.lock().push((new.clone(), old.clone()));
            Ok(())
        })
        .build();

    store.write(state! { "count" => 1 }).unwrap();
    store.write(state! { "count" => 1 }).unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], (json!(1), json!(0)));
    assert_eq!(log[1], (json!(1), json!(1)));
}

#[test]
fn computed_property_change_reaches_its_watcher() {
    let log = change_log();
    let log2 = log.clone();
    let store = Store::builder(state! { "first" => "Ada", "last" => "Lovelace" })
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
        .watcher("full", move |new, old| {
            log2.lock().push((new.clone(), old.clone()));
            Ok(())
        })
        .build();

    store.write(state! { "first" => "Grace" }).unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0], (json!("Grace Lovelace"), json!("Ada Lovelace")));
}

#[test]
fn failing_reaction_propagates_and_keeps_commit() {
    let later_ran = Arc::new(Mutex::new(false));
    let later_ran2 = later_ran.clone();
    let store = Store::builder(state! { "a" => 0, "b" => 0 })
        .watcher("a", |_, _| Err(anyhow::anyhow!("reaction exploded")))
        .watcher("b", move |_, _| {
            *later_ran2.lock() = true;
            Ok(())
        })
        .build();

    let err = store.write(state! { "a" => 1, "b" => 1 }).unwrap_err();
    match err {
        StoreError::Watcher { property, error } => {
            assert_eq!(property, "a");
            assert_eq!(error.to_string(), "reaction exploded");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The commit already happened and is not rolled back; the watcher
    // registered after the failing one was skipped for this dispatch.
    assert_eq!(store.get("a"), json!(1));
    assert_eq!(store.get("b"), json!(1));
    assert!(!*later_ran.lock());
}

#[test]
fn nested_write_from_reaction_runs_to_completion_first() {
    let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let cell: Arc<OnceLock<Store>> = Arc::new(OnceLock::new());

    let order_a = order.clone();
    let cell_a = cell.clone();
    let order_b = order.clone();
    let store = Store::builder(state! { "a" => 0, "b" => 0 })
        .watcher("a", move |new, _| {
            order_a.lock().push(format!("a:enter:{new}"));
            if let Some(store) = cell_a.get() {
                store.write(state! { "b" => 10 })?;
            }
            order_a.lock().push(format!("a:exit:{new}"));
            Ok(())
        })
        .watcher("b", move |new, _| {
            order_b.lock().push(format!("b:{new}"));
            Ok(())
        })
        .build();
    cell.set(store.clone()).ok();

    store.write(state! { "a" => 1 }).unwrap();

    // The nested cycle (including its own watcher dispatch) completes on the
    // call stack before the outer reaction returns.
    assert_eq!(
        *order.lock(),
        vec![
            "a:enter:1".to_string(),
            "b:10".to_string(),
            "a:exit:1".to_string(),
        ]
    );
    assert_eq!(store.get("b"), json!(10));
}

#[test]
fn last_registration_for_a_name_wins() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let first = log.clone();
    let second = log.clone();
    let store = Store::builder(state! { "k" => 0 })
        .watcher("k", move |_, _| {
            first.lock().push("first");
            Ok(())
        })
        .watcher("k", move |_, _| {
            second.lock().push("second");
            Ok(())
        })
        .build();

    store.write(state! { "k" => 1 }).unwrap();
    assert_eq!(*log.lock(), vec!["second"]);
}
