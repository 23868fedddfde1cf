#![forbid(unsafe_code)]

//! Rewind public facade crate.
//!
//! Re-exports the deferred [`Registry`], the action [`History`], and (with the
//! default `events` feature) the [`Emitter`], plus a prelude for day-to-day
//! usage.
//!
//! ```ignore
//! use rewind::prelude::*;
//! use serde_json::json;
//!
//! let history = History::new();
//! history.action("toggle", |_, _| async { Ok(Some(Undo::from_fn(|| Ok(())))) }, &[] as &[&str]);
//! history.exec("toggle", json!({})).await?;
//! history.undo(1).await?;
//! ```

// --- Registry re-exports ---------------------------------------------------

pub use rewind_registry::{Registry, RegistryError};

// --- History re-exports ----------------------------------------------------

#[cfg(feature = "config")]
pub use rewind_history::ConfigError;
pub use rewind_history::{
    Action, ActionError, ActionResult, Context, DEFAULT_LIMIT, FnAction, History, HistoryConfig,
    HistoryError, HistoryLog, REDO_ACTION, UNDO_ACTION, Undo, action_fn, decode_parameters,
};

// --- Events re-exports -----------------------------------------------------

#[cfg(feature = "events")]
pub use rewind_events::{Emitter, HandlerId};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for rewind hosts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A history operation failed.
    #[error(transparent)]
    History(#[from] HistoryError),
    /// A registry read failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Loading a history configuration failed.
    #[cfg(feature = "config")]
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Standard result type for rewind hosts.
pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        Action, ActionResult, Context, Error, History, HistoryConfig, HistoryError, HistoryLog,
        Registry, Result, Undo,
    };

    #[cfg(feature = "events")]
    pub use crate::{Emitter, events};

    pub use crate::{history, registry};
}

#[cfg(feature = "events")]
pub use rewind_events as events;
pub use rewind_history as history;
pub use rewind_registry as registry;
pub use serde_json::{Value, json};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_error_converts() {
        let err: Error = HistoryError::UnknownAction("missing".into()).into();
        assert_eq!(err.to_string(), "unknown action `missing`");
        assert!(matches!(err, Error::History(_)));
    }

    #[test]
    fn registry_error_converts() {
        let err: Error = RegistryError::Closed { key: "user".into() }.into();
        assert!(matches!(err, Error::Registry(_)));
        assert!(err.to_string().contains("user"));
    }
}
