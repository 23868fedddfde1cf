#![forbid(unsafe_code)]

//! History error type.

use rewind_registry::RegistryError;

use crate::action::ActionError;

/// Errors returned by [`History`](crate::History) operations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// `exec` was called with a name that has no registered action.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    /// The action, or one of its undo callbacks, failed.
    #[error(transparent)]
    Action(ActionError),
    /// Required context could not be resolved.
    #[error("context unavailable: {0}")]
    Context(#[from] RegistryError),
}

impl HistoryError {
    /// Whether this is the error raised for an unregistered action name.
    #[must_use]
    pub fn is_unknown_action(&self) -> bool {
        matches!(self, Self::UnknownAction(_))
    }

    /// The action's own error, if this wraps one.
    #[must_use]
    pub fn action_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Action(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
