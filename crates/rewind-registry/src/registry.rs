#![forbid(unsafe_code)]

//! Named slots with deferred reads.
//!
//! Values live in a `HashMap` guarded by a mutex; every operation takes
//! `&self`, so one registry can be shared between producers and any number of
//! suspended readers. A read on an unset slot parks on a [`Shared`] oneshot
//! receiver that is stored per key and resolved by the next `set`.
//!
//! ```text
//! set("a", 1)      ┌──────────── values ────────────┐
//! ───────────────► │ a = 1                          │
//!                  └────────────────────────────────┘
//! get("b")         ┌──────────── pending ───────────┐
//! ───────────────► │ b = (sender, shared receiver)  │ ◄── get("b") clones receiver
//!                  └────────────────────────────────┘
//! set("b", 2)      pending["b"] removed, sender fires, both reads yield 2
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared, try_join_all};
use tracing::trace;

use crate::error::RegistryError;

/// Shared suspension handed to every reader of one unset slot.
type Waiter<V> = Shared<oneshot::Receiver<V>>;

/// The single outstanding read on an unset slot.
struct Pending<V> {
    resolve: oneshot::Sender<V>,
    waiter: Waiter<V>,
}

/// Outcome of looking a slot up at call time.
enum Lookup<V> {
    Ready(V),
    Waiting(Waiter<V>),
}

struct SlotState<V> {
    values: HashMap<String, V>,
    pending: HashMap<String, Pending<V>>,
}

impl<V: Clone + Send + Sync + 'static> SlotState<V> {
    /// Return the pending waiter for `key`, creating it on first use.
    fn waiter(&mut self, key: &str) -> Waiter<V> {
        if let Some(pending) = self.pending.get(key) {
            return pending.waiter.clone();
        }

        let (resolve, receiver) = oneshot::channel();
        let waiter = receiver.shared();
        trace!(target: "rewind.registry", key = %key, "pending request created");
        self.pending.insert(
            key.to_owned(),
            Pending {
                resolve,
                waiter: waiter.clone(),
            },
        );
        waiter
    }
}

/// A deferred key/value store.
///
/// Each slot is either unset or holds one value of type `V`. Reading an unset
/// slot with [`get`](Self::get) suspends until the slot is set; concurrent
/// readers of the same slot share one pending request and all receive a clone
/// of the value.
pub struct Registry<V> {
    state: Mutex<SlotState<V>>,
}

impl<V> fmt::Debug for Registry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Registry")
            .field("set", &state.values.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState {
                values: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }
}

impl<K: Into<String>, V: Clone + Send + Sync + 'static> FromIterator<(K, V)> for Registry<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::with_values(iter)
    }
}

impl<V: Clone + Send + Sync + 'static> Registry<V> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with initial members.
    #[must_use]
    pub fn with_values<K, I>(initial: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let registry = Self::default();
        {
            let mut state = registry.lock();
            state
                .values
                .extend(initial.into_iter().map(|(key, value)| (key.into(), value)));
        }
        registry
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<V>> {
        // Every critical section leaves the maps consistent, so a panic in
        // another holder does not invalidate the state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Whether the slot currently holds a value. Never suspends.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.lock().values.contains_key(key)
    }

    /// Current value of the slot, without waiting for it.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<V> {
        self.lock().values.get(key).cloned()
    }

    /// Names of all currently set slots, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().values.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Whether a read on `key` is waiting for the slot to be set.
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().pending.contains_key(key)
    }

    /// Number of slots with an outstanding pending request.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Read a slot, waiting until it is set.
    ///
    /// The slot is looked up when `get` is called, not when the future is
    /// first polled. A set slot yields its current value. An unset slot joins
    /// the slot's pending request right away; every reader joined to it
    /// resolves on the next [`set`](Self::set) of the slot, even if the slot
    /// is unset again before the reader is polled. `unset` does not resolve
    /// or cancel the wait.
    ///
    /// The returned future does not borrow the registry.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Closed`] if the registry is dropped before the slot
    /// is set.
    pub fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<V, RegistryError>> + Send + use<V> {
        let lookup = {
            let mut state = self.lock();
            match state.values.get(key) {
                Some(value) => Lookup::Ready(value.clone()),
                None => Lookup::Waiting(state.waiter(key)),
            }
        };
        let key = key.to_owned();

        async move {
            match lookup {
                Lookup::Ready(value) => Ok(value),
                Lookup::Waiting(waiter) => {
                    waiter.await.map_err(|_| RegistryError::Closed { key })
                }
            }
        }
    }

    /// Read several slots, waiting until all of them are set.
    ///
    /// Every requested slot is looked up when `all` is called, as with
    /// [`get`](Self::get), and they resolve concurrently. With
    /// `include_extra`, every other slot that is set once the requested ones
    /// have resolved is merged into the result without waiting on anything
    /// further.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Closed`] if the registry is dropped while waiting.
    pub fn all<'a, K>(
        &'a self,
        keys: &[K],
        include_extra: bool,
    ) -> impl Future<Output = Result<BTreeMap<String, V>, RegistryError>> + Send + use<'a, K, V>
    where
        K: AsRef<str>,
    {
        let names: Vec<String> = keys.iter().map(|key| key.as_ref().to_owned()).collect();
        let reads: Vec<_> = names.iter().map(|key| self.get(key)).collect();

        async move {
            let values = try_join_all(reads).await?;
            let mut resolved: BTreeMap<String, V> = names.into_iter().zip(values).collect();

            if include_extra {
                let state = self.lock();
                for (key, value) in &state.values {
                    resolved
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
            }

            Ok(resolved)
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Set a slot, or unset it when `value` is `None`.
    ///
    /// Setting a defined value resolves the slot's pending request, if any,
    /// and discards it; the next read of an unset slot with this name starts
    /// a fresh one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Option<V>>) {
        let key = key.into();
        let Some(value) = value.into() else {
            self.unset(&key);
            return;
        };

        let mut state = self.lock();
        if let Some(pending) = state.pending.remove(&key) {
            trace!(target: "rewind.registry", key = %key, "pending request resolved");
            // Err only means every reader already went away.
            let _ = pending.resolve.send(value.clone());
        }
        state.values.insert(key, value);
    }

    /// Remove a slot's value. Pending reads keep waiting.
    pub fn unset(&self, key: &str) {
        self.lock().values.remove(key);
    }

    /// Set every member whose value is `Some`. `None` members are skipped,
    /// so a patch never removes values.
    pub fn patch<K, I>(&self, members: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Option<V>)>,
    {
        for (key, value) in members {
            if let Some(value) = value {
                self.set(key, value);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
