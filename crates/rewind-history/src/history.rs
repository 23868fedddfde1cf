#![forbid(unsafe_code)]

//! Action history with bounded undo/redo logs.
//!
//! [`History`] keeps two registries and two logs:
//!
//! - an action registry mapping names to `{ action, required context keys }`,
//! - a context registry holding ambient values supplied by the host,
//! - the done log (reversible actions that ran, newest first),
//! - the undone log (actions undone and available for redo, newest first).
//!
//! # Invariants
//!
//! 1. `done.len() <= config.limit` after every operation.
//! 2. A successful, reversible `exec` clears the undone log; a redo does not.
//! 3. A failed `exec` records nothing and leaves the undone log untouched.
//! 4. Irreversible actions never enter either log.
//! 5. `exec`, `undo` and `redo` never interleave their log work: each holds
//!    the log gate while its handlers or callbacks run. `exec` waits for its
//!    context before taking the gate.
//! 6. The gate is not reentrant. Actions and undo callbacks must not call
//!    `exec`, `undo` or `redo` on their own history.
//!
//! ```text
//! exec(a) exec(b) exec(c)
//! ┌──────────────────────────────┐
//! │ done:   [c, b, a]            │
//! │ undone: []                   │
//! └──────────────────────────────┘
//! undo(2)
//! ┌──────────────────────────────┐
//! │ done:   [a]                  │
//! │ undone: [b, c]               │
//! └──────────────────────────────┘
//! exec(d)  <-- new branch, clears undone
//! ┌──────────────────────────────┐
//! │ done:   [d, a]               │
//! │ undone: []                   │
//! └──────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rewind_registry::Registry;
use serde::Deserialize;
use serde_json::Value;
use tracing::{Instrument, debug, debug_span};
use web_time::SystemTime;

use crate::action::{
    Action, ActionHandler, ActionResult, Context, Undo, action_fn, decode_parameters,
};
use crate::config::HistoryConfig;
use crate::error::HistoryError;

/// Reserved action name that undoes `{ "steps": n }` entries (default 1).
///
/// Dispatch it with [`History::exec`] from host code only. Called from inside
/// an action or undo callback of the same history it waits on the log gate
/// forever.
pub const UNDO_ACTION: &str = "history:undo";
/// Reserved action name that redoes `{ "steps": n }` entries (default 1).
///
/// Same reentrancy rule as [`UNDO_ACTION`].
pub const REDO_ACTION: &str = "history:redo";

/// Read-only snapshot of one log entry.
///
/// Owned copies of the entry's data; changing a snapshot never affects the
/// history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryLog {
    /// Action name.
    pub name: String,
    /// Parameters the action ran with.
    pub parameters: Value,
    /// Context the action ran with.
    pub context: Context,
    /// When the entry was last executed, redone, or undone.
    pub time: SystemTime,
}

struct Entry {
    name: String,
    parameters: Value,
    context: Context,
    handler: Arc<ActionHandler>,
    time: SystemTime,
    undo: Undo,
}

impl Entry {
    fn to_log(&self) -> HistoryLog {
        HistoryLog {
            name: self.name.clone(),
            parameters: self.parameters.clone(),
            context: self.context.clone(),
            time: self.time,
        }
    }
}

#[derive(Default)]
struct Logs {
    /// Newest at front.
    done: VecDeque<Entry>,
    /// Newest at front.
    undone: VecDeque<Entry>,
}

#[derive(Deserialize)]
struct StepParams {
    #[serde(default = "one_step")]
    steps: usize,
}

fn one_step() -> usize {
    1
}

struct HistoryInner {
    config: HistoryConfig,
    actions: Registry<Arc<ActionHandler>>,
    context: Registry<Value>,
    logs: Mutex<Logs>,
    /// Held by `exec`, `undo` and `redo` while they touch the logs.
    gate: tokio::sync::Mutex<()>,
}

impl HistoryInner {
    fn logs(&self) -> MutexGuard<'_, Logs> {
        // Log mutations never span an await and leave both deques valid.
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, name: &str, action: Arc<dyn Action>, required: Vec<String>) {
        debug!(
            target: "rewind.history",
            action = %name,
            required = ?required,
            "action registered"
        );
        self.actions.set(name, Arc::new(ActionHandler { action, required }));
    }

    fn install_builtins(&self, history: &Weak<HistoryInner>) {
        let undo_target = history.clone();
        self.register(
            UNDO_ACTION,
            Arc::new(action_fn(move |parameters, _context| {
                dispatch_undo(undo_target.clone(), parameters)
            })),
            Vec::new(),
        );

        let redo_target = history.clone();
        self.register(
            REDO_ACTION,
            Arc::new(action_fn(move |parameters, _context| {
                dispatch_redo(redo_target.clone(), parameters)
            })),
            Vec::new(),
        );
    }

    /// Look up the handler and join its context reads now; the returned
    /// future waits for the context, then runs under the log gate.
    fn exec<'a>(
        &'a self,
        name: &str,
        parameters: Value,
    ) -> impl Future<Output = Result<(), HistoryError>> + Send + use<'a> {
        let name = name.to_owned();
        let lookup = self.actions.peek(&name).map(|handler| {
            let context = self.context.all(handler.required.as_slice(), false);
            (handler, context)
        });

        async move {
            let Some((handler, context)) = lookup else {
                return Err(HistoryError::UnknownAction(name));
            };

            let context = context.await?;
            debug!(target: "rewind.history", action = %name, "context resolved");

            let _gate = self.gate.lock().await;
            if let Some(entry) = self.run(name, parameters, context, handler).await? {
                self.record(entry, true);
            }
            Ok(())
        }
    }

    /// Invoke an action. Returns the log entry when the run was reversible.
    async fn run(
        &self,
        name: String,
        parameters: Value,
        context: Context,
        handler: Arc<ActionHandler>,
    ) -> Result<Option<Entry>, HistoryError> {
        let outcome = handler
            .action
            .run(parameters.clone(), context.clone())
            .await
            .map_err(HistoryError::Action)?;

        let Some(undo) = outcome else {
            debug!(target: "rewind.history", action = %name, "irreversible action completed");
            return Ok(None);
        };

        Ok(Some(Entry {
            name,
            parameters,
            context,
            handler,
            time: SystemTime::now(),
            undo,
        }))
    }

    /// Push an entry onto the done log and enforce the capacity.
    fn record(&self, entry: Entry, clear_undone: bool) {
        let limit = self.config.limit;
        let mut logs = self.logs();

        if clear_undone && !logs.undone.is_empty() {
            debug!(
                target: "rewind.history",
                discarded = logs.undone.len(),
                "redo branch discarded"
            );
            logs.undone.clear();
        }

        let name = entry.name.clone();
        logs.done.push_front(entry);

        if logs.done.len() > limit {
            let evicted = logs.done.len() - limit;
            logs.done.truncate(limit);
            debug!(
                target: "rewind.history",
                evicted = evicted,
                limit = limit,
                "done log truncated"
            );
        }

        debug!(
            target: "rewind.history",
            action = %name,
            done = logs.done.len(),
            undone = logs.undone.len(),
            "action recorded"
        );
    }

    async fn undo(&self, steps: usize) -> Result<(), HistoryError> {
        let _gate = self.gate.lock().await;
        self.undo_steps(steps).await
    }

    async fn redo(&self, steps: usize) -> Result<(), HistoryError> {
        let _gate = self.gate.lock().await;
        self.redo_steps(steps).await
    }

    /// Undo loop. Caller holds the log gate.
    async fn undo_steps(&self, steps: usize) -> Result<(), HistoryError> {
        for _ in 0..steps {
            let Some(mut entry) = self.pop_done() else {
                break;
            };

            if let Err(err) = entry.undo.invoke().await {
                self.logs().done.push_front(entry);
                return Err(HistoryError::Action(err));
            }

            entry.time = SystemTime::now();
            let mut logs = self.logs();
            debug!(
                target: "rewind.history",
                action = %entry.name,
                done = logs.done.len(),
                undone = logs.undone.len() + 1,
                "action undone"
            );
            logs.undone.push_front(entry);
        }

        Ok(())
    }

    /// Redo loop. Caller holds the log gate.
    async fn redo_steps(&self, steps: usize) -> Result<(), HistoryError> {
        for _ in 0..steps {
            let Some(entry) = self.pop_undone() else {
                break;
            };

            let Entry {
                name,
                parameters,
                context,
                handler,
                ..
            } = &entry;
            let rerun = self
                .run(
                    name.clone(),
                    parameters.clone(),
                    context.clone(),
                    Arc::clone(handler),
                )
                .await;

            match rerun {
                Ok(Some(refreshed)) => {
                    debug!(target: "rewind.history", action = %refreshed.name, "action redone");
                    self.record(refreshed, false);
                }
                Ok(None) => {
                    debug!(
                        target: "rewind.history",
                        action = %entry.name,
                        "redone action is no longer reversible"
                    );
                }
                Err(err) => {
                    self.logs().undone.push_front(entry);
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    fn pop_done(&self) -> Option<Entry> {
        self.logs().done.pop_front()
    }

    fn pop_undone(&self) -> Option<Entry> {
        self.logs().undone.pop_front()
    }
}

// The built-ins only ever run inside `exec`, which already holds the gate.

async fn dispatch_undo(
    history: Weak<HistoryInner>,
    parameters: Value,
) -> ActionResult<Option<Undo>> {
    let StepParams { steps } = decode_parameters(parameters)?;
    if let Some(history) = history.upgrade() {
        history.undo_steps(steps).await?;
    }
    Ok(None)
}

async fn dispatch_redo(
    history: Weak<HistoryInner>,
    parameters: Value,
) -> ActionResult<Option<Undo>> {
    let StepParams { steps } = decode_parameters(parameters)?;
    if let Some(history) = history.upgrade() {
        history.redo_steps(steps).await?;
    }
    Ok(None)
}

/// An action history: registered actions, deferred context, and bounded
/// undo/redo logs.
///
/// Cloning creates a new handle to the **same** history. Independent
/// histories are created with [`History::new`].
#[derive(Clone)]
pub struct History {
    inner: Arc<HistoryInner>,
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let logs = self.inner.logs();
        f.debug_struct("History")
            .field("done", &logs.done.len())
            .field("undone", &logs.undone.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Create a history with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    /// Create a history with the given configuration.
    ///
    /// [`UNDO_ACTION`] and [`REDO_ACTION`] are registered up front.
    #[must_use]
    pub fn with_config(config: HistoryConfig) -> Self {
        let inner = Arc::new_cyclic(|history| {
            let inner = HistoryInner {
                config,
                actions: Registry::new(),
                context: Registry::new(),
                logs: Mutex::new(Logs::default()),
                gate: tokio::sync::Mutex::new(()),
            };
            inner.install_builtins(history);
            inner
        });
        Self { inner }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register an async closure as the action `name`, replacing any action
    /// already registered under that name.
    ///
    /// `required` lists the context keys that must be set before the action
    /// runs; `exec` waits for them.
    pub fn action<F, Fut, S>(&self, name: &str, action: F, required: &[S])
    where
        F: Fn(Value, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult<Option<Undo>>> + Send + 'static,
        S: AsRef<str>,
    {
        self.register(name, Arc::new(action_fn(action)), required);
    }

    /// Register an [`Action`] implementation under `name`.
    pub fn register<S: AsRef<str>>(&self, name: &str, action: Arc<dyn Action>, required: &[S]) {
        let required = required.iter().map(|key| key.as_ref().to_owned()).collect();
        self.inner.register(name, action, required);
    }

    /// Supply a context value, or remove it with `None`.
    ///
    /// Actions waiting on this key resume once it is set.
    pub fn context(&self, name: &str, value: impl Into<Option<Value>>) {
        self.inner.context.set(name, value);
    }

    /// Whether an action is registered under `name`.
    #[must_use]
    pub fn has_action(&self, name: &str) -> bool {
        self.inner.actions.has(name)
    }

    /// Whether a context value is currently set under `name`.
    #[must_use]
    pub fn has_context(&self, name: &str) -> bool {
        self.inner.context.has(name)
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Execute the action `name`.
    ///
    /// Waits for the action's required context, runs it, and records it on
    /// the done log if it returned an undo callback. Recording a new entry
    /// discards the undone log.
    ///
    /// The handler is looked up and the context reads are joined when `exec`
    /// is called, so a context value set and removed again before the first
    /// poll still satisfies this call. The action itself runs after any
    /// in-flight `undo`/`redo` has finished.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::UnknownAction`] if nothing was registered under
    ///   `name` when `exec` was called.
    /// - [`HistoryError::Action`] with the action's own error. Nothing is
    ///   recorded and the undone log is kept.
    pub fn exec<'a>(
        &'a self,
        name: &str,
        parameters: Value,
    ) -> impl Future<Output = Result<(), HistoryError>> + Send + use<'a> {
        let span = debug_span!("history.exec", action = %name);
        let exec = span.in_scope(|| self.inner.exec(name, parameters));
        exec.instrument(span)
    }

    /// Undo up to `steps` entries, newest first, one after another.
    ///
    /// Stops early when the done log runs out. Waits for any running `exec`
    /// or `redo` to finish first.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Action`] if an undo callback fails. The failing entry
    /// stays at the head of the done log; earlier steps remain undone.
    pub async fn undo(&self, steps: usize) -> Result<(), HistoryError> {
        self.inner
            .undo(steps)
            .instrument(debug_span!("history.undo", steps = steps))
            .await
    }

    /// Redo up to `steps` entries, most recently undone first.
    ///
    /// Each entry re-runs its action with the parameters and context it was
    /// recorded with. Stops early when the undone log runs out. Waits for any
    /// running `exec` or `undo` to finish first.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Action`] if a re-run fails. The failing entry stays at
    /// the head of the undone log.
    pub async fn redo(&self, steps: usize) -> Result<(), HistoryError> {
        self.inner
            .redo(steps)
            .instrument(debug_span!("history.redo", steps = steps))
            .await
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Up to `n` most recent done entries, newest first.
    #[must_use]
    pub fn last(&self, n: usize) -> Vec<HistoryLog> {
        self.inner.logs().done.iter().take(n).map(Entry::to_log).collect()
    }

    /// Up to `n` most recently undone entries, newest first.
    #[must_use]
    pub fn last_undone(&self, n: usize) -> Vec<HistoryLog> {
        self.inner
            .logs()
            .undone
            .iter()
            .take(n)
            .map(Entry::to_log)
            .collect()
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.inner.logs().done.is_empty()
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.inner.logs().undone.is_empty()
    }

    /// Number of entries on the done log.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.inner.logs().done.len()
    }

    /// Number of entries on the undone log.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.inner.logs().undone.len()
    }

    /// Get the current configuration.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.inner.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop both logs. Registered actions and context are kept.
    pub fn clear(&self) {
        let mut logs = self.inner.logs();
        logs.done.clear();
        logs.undone.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
