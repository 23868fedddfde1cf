#![forbid(unsafe_code)]

//! Registry error type.

/// Errors surfaced by deferred registry reads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The registry was dropped while a read on `key` was still pending.
    #[error("registry dropped while `{key}` was pending")]
    Closed { key: String },
}
