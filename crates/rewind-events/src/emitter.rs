#![forbid(unsafe_code)]

//! Event emitter with per-event handler lists.
//!
//! # Invariants
//!
//! 1. Handlers for one event run in registration order.
//! 2. `emit` over several events visits them in the order given; a handler
//!    registered for two of them runs once per event.
//! 3. The handler list is snapshotted before any handler runs, so handlers
//!    may call `on`, `off`, or `emit` on the same emitter. Changes take
//!    effect from the next `emit`.
//! 4. `off` removes only the registration identified by its [`HandlerId`].

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Identifies one `on` registration. Returned by [`Emitter::on`] and passed
/// to [`Emitter::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

struct Registration<P> {
    id: HandlerId,
    handler: Handler<P>,
}

struct EmitterState<K, P> {
    next_id: u64,
    handlers: HashMap<K, Vec<Registration<P>>>,
}

/// A synchronous publish/subscribe dispatcher keyed by event `K`, delivering
/// payloads of type `P`.
///
/// Cloning creates a new handle to the **same** emitter.
pub struct Emitter<K, P> {
    inner: Arc<Mutex<EmitterState<K, P>>>,
}

impl<K, P> Clone for Emitter<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: fmt::Debug, P> fmt::Debug for Emitter<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let counts: Vec<(&K, usize)> = state
            .handlers
            .iter()
            .map(|(event, list)| (event, list.len()))
            .collect();
        f.debug_struct("Emitter").field("handlers", &counts).finish()
    }
}

impl<K, P> Default for Emitter<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> Emitter<K, P>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Create an emitter with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EmitterState {
                next_id: 0,
                handlers: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EmitterState<K, P>> {
        // Handlers never run under the lock, so the state is always whole.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `handler` to every event in `events`.
    ///
    /// ```ignore
    /// let id = emitter.on(["saved", "closed"], |path: &String| println!("{path}"));
    /// ```
    pub fn on<I>(&self, events: I, handler: impl Fn(&P) + Send + Sync + 'static) -> HandlerId
    where
        I: IntoIterator,
        I::Item: Into<K>,
    {
        let handler: Handler<P> = Arc::new(handler);
        let mut state = self.lock();
        let id = HandlerId(state.next_id);
        state.next_id += 1;

        for event in events {
            state
                .handlers
                .entry(event.into())
                .or_default()
                .push(Registration {
                    id,
                    handler: Arc::clone(&handler),
                });
        }
        id
    }

    /// Detach the registration `id` from every event in `events`.
    ///
    /// Returns how many handler entries were removed. Unknown events and ids
    /// are ignored.
    pub fn off<I>(&self, events: I, id: HandlerId) -> usize
    where
        I: IntoIterator,
        I::Item: Into<K>,
    {
        let mut state = self.lock();
        let mut removed = 0;

        for event in events {
            let event = event.into();
            let Some(list) = state.handlers.get_mut(&event) else {
                continue;
            };
            let before = list.len();
            list.retain(|registration| registration.id != id);
            removed += before - list.len();
            if list.is_empty() {
                state.handlers.remove(&event);
            }
        }
        removed
    }

    /// Invoke every handler registered for each event in `events`, in order.
    ///
    /// Returns the number of handler invocations.
    pub fn emit<I>(&self, events: I, payload: &P) -> usize
    where
        I: IntoIterator,
        I::Item: Into<K>,
    {
        let mut invoked = 0;

        for event in events {
            let event = event.into();
            // Snapshot before calling so handlers can re-enter the emitter.
            let handlers: Vec<Handler<P>> = {
                let state = self.lock();
                state
                    .handlers
                    .get(&event)
                    .map(|list| list.iter().map(|r| Arc::clone(&r.handler)).collect())
                    .unwrap_or_default()
            };

            trace!(
                target: "rewind.events",
                event = ?event,
                handlers = handlers.len(),
                "emit"
            );

            for handler in &handlers {
                handler(payload);
            }
            invoked += handlers.len();
        }
        invoked
    }

    /// Number of handlers registered for `event`.
    #[must_use]
    pub fn handler_count(&self, event: &K) -> usize {
        self.lock().handlers.get(event).map_or(0, Vec::len)
    }

    /// Whether any handler is registered for `event`.
    #[must_use]
    pub fn has_handlers(&self, event: &K) -> bool {
        self.handler_count(event) > 0
    }

    /// Remove every handler for every event.
    pub fn clear(&self) {
        self.lock().handlers.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
