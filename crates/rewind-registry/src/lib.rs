#![forbid(unsafe_code)]

//! Deferred key/value registry.
//!
//! A [`Registry`] holds a set of named slots. Each slot is either unset or
//! holds exactly one value. Reading an unset slot does not fail: [`Registry::get`]
//! suspends until some producer calls [`Registry::set`] on that slot.
//!
//! # Pending requests
//!
//! ```text
//!  get("user") ──┐
//!  get("user") ──┼──► Pending("user") ──── set("user", v) ──► all resolve to v
//!  get("user") ──┘         (one per key, discarded on resolution)
//! ```
//!
//! # Invariants
//!
//! 1. At most one pending request exists per slot name.
//! 2. A pending request is resolved and removed in the same critical section
//!    as the `set` that defines its slot.
//! 3. `set(key, None)` is `unset(key)`; it never stores an absent value and
//!    never resolves a pending read.
//! 4. `unset` never touches pending requests. Only `set` resolves them.
//! 5. A read joins the pending request when `get`/`all` is called, not when
//!    its future is first polled.

pub mod error;
pub mod registry;

pub use error::RegistryError;
pub use registry::Registry;
