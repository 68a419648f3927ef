//! In-flight registry
//!
//! Per-key serialization of chunk work: the first requester of a missing
//! chunk becomes its leader and processes it, later requesters follow and
//! await the leader's result over a `watch` channel. A leader that is
//! dropped without completing releases the key, and its followers see
//! `None` and retry.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Outcome of `InFlightRegistry::claim`
pub enum Claim<K: Eq + Hash + Clone, V: Clone> {
    /// Caller must produce the value
    Leader(InFlightGuard<K, V>),
    /// Someone else is producing it
    Follower(Waiter<V>),
}

/// Registry of keys currently being produced
pub struct InFlightRegistry<K, V> {
    slots: Mutex<HashMap<K, watch::Receiver<Option<V>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> InFlightRegistry<K, V> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, watch::Receiver<Option<V>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Become the leader for `key`, or follow the current leader
    pub fn claim(self: &Arc<Self>, key: K) -> Claim<K, V> {
        let mut slots = self.slots();
        if let Some(rx) = slots.get(&key) {
            return Claim::Follower(Waiter { rx: rx.clone() });
        }
        let (tx, rx) = watch::channel(None);
        slots.insert(key.clone(), rx);
        Claim::Leader(InFlightGuard {
            registry: Arc::clone(self),
            key,
            tx: Some(tx),
        })
    }

    /// Number of keys in flight
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &K) {
        self.slots().remove(key);
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for InFlightRegistry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the leader; publishes the result on `complete`
pub struct InFlightGuard<K: Eq + Hash + Clone, V: Clone> {
    registry: Arc<InFlightRegistry<K, V>>,
    key: K,
    tx: Option<watch::Sender<Option<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> InFlightGuard<K, V> {
    /// Publish `value` to every follower and release the key
    pub fn complete(mut self, value: V) {
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(value));
        }
        self.registry.release(&self.key);
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for InFlightGuard<K, V> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.registry.release(&self.key);
        }
    }
}

/// Held by a follower
pub struct Waiter<V> {
    rx: watch::Receiver<Option<V>>,
}

impl<V: Clone> Waiter<V> {
    /// Wait for the leader; `None` if it gave up
    pub async fn wait(mut self) -> Option<V> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        }
    }
}
