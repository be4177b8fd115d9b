//! One-shot waiters keyed by action type
//!
//! Backs the `take` effect: a waiter is registered for a type string and is
//! woken by the next dispatch of that type. Every waiter registered for the
//! type fires, in registration order, and the entry is then cleared.
//! A waiter registered after a dispatch only sees later dispatches.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

type Callback<T> = Box<dyn FnOnce(T) + Send>;

/// Registry of single-use callbacks keyed by action type.
pub struct Waiters<T> {
    listeners: Mutex<HashMap<String, Vec<Callback<T>>>>,
}

impl<T> Default for Waiters<T> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> std::fmt::Debug for Waiters<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock();
        let mut keys: Vec<_> = listeners.keys().collect();
        keys.sort();
        f.debug_struct("Waiters").field("pending", &keys).finish()
    }
}

impl<T: Clone + Send + 'static> Waiters<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for the next emit of `key`.
    pub fn once<F>(&self, key: impl Into<String>, callback: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.listeners
            .lock()
            .entry(key.into())
            .or_default()
            .push(Box::new(callback));
    }

    /// Register a waiter for the next emit of `key` and get its receiver.
    pub fn wait(&self, key: impl Into<String>) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.once(key, move |value| {
            // The receiver may be gone if the waiting task was cancelled.
            let _ = tx.send(value);
        });
        rx
    }

    /// Whether anything is waiting on `key`.
    pub fn has_pending(&self, key: &str) -> bool {
        self.listeners.lock().contains_key(key)
    }

    /// Number of callbacks waiting on `key`.
    pub fn pending(&self, key: &str) -> usize {
        self.listeners.lock().get(key).map_or(0, Vec::len)
    }

    /// Fire and clear every callback registered for `key`.
    ///
    /// Callbacks run synchronously, in registration order, outside the lock,
    /// so a callback may register a new waiter for the same key; that waiter
    /// sees the next emit, not this one. Returns how many callbacks fired.
    pub fn emit(&self, key: &str, value: &T) -> usize {
        self.detach(key).fire(value)
    }

    /// Unregister every callback waiting on `key` without firing them.
    ///
    /// Splits an emit in two: the set of woken waiters is fixed here, and
    /// [`Detached::fire`] delivers the value later.
    pub fn detach(&self, key: &str) -> Detached<T> {
        Detached {
            key: key.to_string(),
            callbacks: self.listeners.lock().remove(key).unwrap_or_default(),
        }
    }
}

/// Callbacks taken out of a [`Waiters`] registry, waiting to be fired.
pub struct Detached<T> {
    key: String,
    callbacks: Vec<Callback<T>>,
}

impl<T> std::fmt::Debug for Detached<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detached")
            .field("key", &self.key)
            .field("count", &self.callbacks.len())
            .finish()
    }
}

impl<T: Clone> Detached<T> {
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Run every callback with a clone of `value`, in registration order.
    pub fn fire(self, value: &T) -> usize {
        let count = self.callbacks.len();
        for callback in self.callbacks {
            callback(value.clone());
        }
        if count > 0 {
            tracing::trace!(key = %self.key, count, "woke waiters");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_emit_without_waiters() {
        let waiters: Waiters<u32> = Waiters::new();
        assert_eq!(waiters.emit("NOTHING", &1), 0);
        assert!(!waiters.has_pending("NOTHING"));
    }

    #[test]
    fn test_all_waiters_fire_in_order_then_clear() {
        let waiters: Waiters<u32> = Waiters::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let seen = seen.clone();
            waiters.once("LOADED", move |value| seen.lock().push((id, value)));
        }
        assert_eq!(waiters.pending("LOADED"), 3);

        assert_eq!(waiters.emit("LOADED", &7), 3);
        assert_eq!(*seen.lock(), vec![(0, 7), (1, 7), (2, 7)]);

        // Entry is consumed: a second emit reaches nobody.
        assert!(!waiters.has_pending("LOADED"));
        assert_eq!(waiters.emit("LOADED", &8), 0);
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn test_keys_are_independent() {
        let waiters: Waiters<&'static str> = Waiters::new();
        let mut a = waiters.wait("A");
        let mut b = waiters.wait("B");

        waiters.emit("A", &"first");

        assert_eq!(a.try_recv().unwrap(), "first");
        assert!(b.try_recv().is_err());
        assert!(waiters.has_pending("B"));
    }

    #[test]
    fn test_reregistering_inside_callback_waits_for_next_emit() {
        let waiters: Arc<Waiters<u32>> = Arc::new(Waiters::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner_waiters = waiters.clone();
        let inner_seen = seen.clone();
        waiters.once("TICK", move |value| {
            inner_seen.lock().push(value);
            let again = inner_seen.clone();
            inner_waiters.once("TICK", move |value| again.lock().push(value));
        });

        waiters.emit("TICK", &1);
        assert_eq!(*seen.lock(), vec![1]);

        waiters.emit("TICK", &2);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_wait_resolves_on_emit() {
        let waiters: Waiters<String> = Waiters::new();
        let rx = waiters.wait("DONE");

        waiters.emit("DONE", &"ok".to_string());

        assert_eq!(rx.await.unwrap(), "ok");
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let waiters: Waiters<u32> = Waiters::new();
        drop(waiters.wait("GONE"));
        assert_eq!(waiters.emit("GONE", &1), 1);
    }

    #[test]
    fn test_detached_waiters_fire_later() {
        let waiters: Waiters<u32> = Waiters::new();
        let mut early = waiters.wait("LOADED");

        let detached = waiters.detach("LOADED");
        // Registered after the detach: left for the next emit.
        let mut late = waiters.wait("LOADED");
        assert!(!detached.is_empty());
        assert!(early.try_recv().is_err());

        assert_eq!(detached.fire(&5), 1);
        assert_eq!(early.try_recv().unwrap(), 5);
        assert!(late.try_recv().is_err());
        assert_eq!(waiters.pending("LOADED"), 1);
        assert!(waiters.detach("NOTHING").is_empty());
    }
}
