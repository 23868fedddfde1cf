#![forbid(unsafe_code)]

//! Action implementations and their undo callbacks.
//!
//! An action is invoked with `(parameters, context)` and reports whether it is
//! reversible by returning an [`Undo`] callback. Actions that return `None`
//! are irreversible and never enter the history logs.
//!
//! At runtime every action shares one representation: parameters and context
//! values are [`serde_json::Value`], and handlers that want a concrete shape
//! decode it with [`decode_parameters`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Error raised by an action or undo callback. Propagated to the caller as is.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of an action or undo callback.
pub type ActionResult<T> = Result<T, ActionError>;

/// Resolved context handed to an action: exactly its required keys.
pub type Context = BTreeMap<String, Value>;

type UndoFn = dyn Fn() -> BoxFuture<'static, ActionResult<()>> + Send + Sync;

/// A zero-argument callback that reverses an action's effect.
///
/// Cloning is cheap; clones share the same callback.
#[derive(Clone)]
pub struct Undo {
    callback: Arc<UndoFn>,
}

impl fmt::Debug for Undo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Undo").finish_non_exhaustive()
    }
}

impl Undo {
    /// Wrap an async reversal callback.
    #[must_use]
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult<()>> + Send + 'static,
    {
        Self {
            callback: Arc::new(move || callback().boxed()),
        }
    }

    /// Wrap a synchronous reversal callback.
    #[must_use]
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn() -> ActionResult<()> + Send + Sync + 'static,
    {
        Self::new(move || future::ready(callback()))
    }

    pub(crate) fn invoke(&self) -> BoxFuture<'static, ActionResult<()>> {
        (self.callback)()
    }
}

/// An action implementation registered under a name.
///
/// The returned future must own everything it needs; the history may keep the
/// action around and run it again on redo.
pub trait Action: Send + Sync {
    /// Run the action. `Some(undo)` marks the run as reversible.
    fn run(&self, parameters: Value, context: Context)
    -> BoxFuture<'static, ActionResult<Option<Undo>>>;
}

/// [`Action`] backed by a closure. Built with [`action_fn`].
pub struct FnAction<F> {
    f: F,
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").finish_non_exhaustive()
    }
}

impl<F, Fut> Action for FnAction<F>
where
    F: Fn(Value, Context) -> Fut + Send + Sync,
    Fut: Future<Output = ActionResult<Option<Undo>>> + Send + 'static,
{
    fn run(
        &self,
        parameters: Value,
        context: Context,
    ) -> BoxFuture<'static, ActionResult<Option<Undo>>> {
        (self.f)(parameters, context).boxed()
    }
}

/// Build an [`Action`] from an async closure.
#[must_use]
pub fn action_fn<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn(Value, Context) -> Fut + Send + Sync,
    Fut: Future<Output = ActionResult<Option<Undo>>> + Send + 'static,
{
    FnAction { f }
}

/// Decode action parameters into a concrete type.
///
/// `null` parameters decode as an empty object, so a struct whose fields all
/// have defaults accepts an omitted parameter value.
///
/// # Errors
///
/// The serde error, boxed, when the parameters do not match `T`.
pub fn decode_parameters<T: DeserializeOwned>(parameters: Value) -> ActionResult<T> {
    let parameters = match parameters {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(parameters).map_err(Into::into)
}

/// Registered action plus the context keys it needs before it can run.
pub(crate) struct ActionHandler {
    pub(crate) action: Arc<dyn Action>,
    pub(crate) required: Vec<String>,
}

impl fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandler")
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Rename {
        #[serde(default)]
        to: String,
    }

    #[test]
    fn decode_parameters_reads_object() {
        let rename: Rename = decode_parameters(json!({ "to": "draft" })).unwrap();
        assert_eq!(rename.to, "draft");
    }

    #[test]
    fn decode_parameters_treats_null_as_empty() {
        let rename: Rename = decode_parameters(Value::Null).unwrap();
        assert_eq!(rename, Rename { to: String::new() });
    }

    #[test]
    fn decode_parameters_rejects_wrong_shape() {
        assert!(decode_parameters::<Rename>(json!(["to"])).is_err());
    }

    #[tokio::test]
    async fn undo_can_be_invoked_repeatedly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let undo = Undo::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        undo.invoke().await.unwrap();
        undo.clone().invoke().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fn_action_passes_parameters_and_context() {
        let action = action_fn(|parameters: Value, context: Context| async move {
            assert_eq!(parameters, json!({ "n": 1 }));
            assert_eq!(context.get("user"), Some(&json!("ada")));
            Ok(None)
        });

        let context = Context::from([("user".to_string(), json!("ada"))]);
        let outcome = action.run(json!({ "n": 1 }), context).await.unwrap();
        assert!(outcome.is_none());
    }
}
