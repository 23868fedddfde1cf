#![forbid(unsafe_code)]

//! Undo/redo action history with deferred context.
//!
//! Hosts register named actions, supply context values whenever they become
//! available, and execute actions by name. Reversible actions return an
//! [`Undo`] callback and land on a bounded done log; [`History::undo`] and
//! [`History::redo`] move entries between the done and undone logs.
//!
//! # Quick Start
//!
//! ```ignore
//! use rewind_history::{History, Undo};
//! use serde_json::json;
//!
//! let history = History::new();
//! history.action("rename", |parameters, context| async move {
//!     let user = context["user"].clone();
//!     // apply the rename ...
//!     Ok(Some(Undo::new(move || async move {
//!         // revert the rename ...
//!         Ok(())
//!     })))
//! }, &["user"]);
//!
//! // The exec parks until "user" is supplied.
//! let (renamed, ()) = tokio::join!(
//!     history.exec("rename", json!({ "to": "draft" })),
//!     async { history.context("user", json!("ada")) },
//! );
//! renamed?;
//!
//! history.undo(1).await?;
//! history.redo(1).await?;
//! ```
//!
//! # Module Structure
//!
//! - [`action`]: the [`Action`] trait, [`Undo`] callbacks, parameter decoding
//! - [`history`]: the [`History`] state machine
//! - [`config`]: [`HistoryConfig`]
//! - [`error`]: [`HistoryError`]

pub mod action;
pub mod config;
pub mod error;
pub mod history;

pub use action::{
    Action, ActionError, ActionResult, Context, FnAction, Undo, action_fn, decode_parameters,
};
#[cfg(feature = "config")]
pub use config::ConfigError;
pub use config::{DEFAULT_LIMIT, HistoryConfig};
pub use error::HistoryError;
pub use history::{History, HistoryLog, REDO_ACTION, UNDO_ACTION};
