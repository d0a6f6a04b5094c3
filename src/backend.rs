//! The underlying store primitive.
//!
//! The reactive layer does not own state; it sits on top of an atomic,
//! synchronous, single-writer state container exposed through the
//! [`StateBackend`] trait. [`MemoryBackend`] is the reference implementation
//! used when no external container is supplied.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use slab::Slab;

use crate::value::{merge, State};

/// Listener invoked after each committed write with `(new, old)` snapshots.
pub type Listener = Arc<dyn Fn(&State, &State) + Send + Sync>;

/// Identifier returned by [`StateBackend::subscribe`].
pub type SubscriberId = usize;

/// The atomic state container the reactive layer is built over.
///
/// Implementations must be synchronous and single-writer: `apply` merges the
/// partial and notifies listeners before returning, and no listener may be
/// invoked while an internal lock is held, so that a listener is free to
/// issue a nested write.
pub trait StateBackend: Send + Sync + 'static {
    /// Clone the current full state.
    fn snapshot(&self) -> State;

    /// Shallow-merge `partial` into the state in one atomic step, then
    /// notify every subscriber with `(new, old)` snapshots.
    fn apply(&self, partial: &State);

    /// Register a listener. It stays active until unsubscribed or the
    /// backend is destroyed.
    fn subscribe(&self, listener: Listener) -> SubscriberId;

    /// Remove a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriberId);

    /// Drop all listeners. State remains readable and writable.
    fn destroy(&self);
}

/// In-memory reference implementation of [`StateBackend`].
pub struct MemoryBackend {
    state: RwLock<State>,
    listeners: Mutex<Slab<Listener>>,
}

impl MemoryBackend {
    /// Create a backend seeded with `initial` state.
    pub fn new(initial: State) -> Self {
        Self {
            state: RwLock::new(initial),
            listeners: Mutex::new(Slab::new()),
        }
    }
}

impl StateBackend for MemoryBackend {
    fn snapshot(&self) -> State {
        self.state.read().clone()
    }

    fn apply(&self, partial: &State) {
        let (new, old) = {
            let mut state = self.state.write();
            let old = state.clone();
            merge(&mut state, partial);
            (state.clone(), old)
        };
        // Clone listeners out so none of our locks are held during callbacks.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&new, &old);
        }
    }

    fn subscribe(&self, listener: Listener) -> SubscriberId {
        self.listeners.lock().insert(listener)
    }

    fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.listeners.lock().try_remove(id);
    }

    fn destroy(&self) {
        self.listeners.lock().clear();
    }
}
