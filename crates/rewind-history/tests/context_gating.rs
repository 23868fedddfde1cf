#![forbid(unsafe_code)]

//! Context gating: `exec` waits for exactly the keys an action requires.
//!
//! The context read is joined when `exec` is called, so a value supplied and
//! removed again before the first poll still reaches the action.
//!
//! Run:
//!   cargo test -p rewind-history --test context_gating

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use rewind_history::{Context, History, Undo};
use serde_json::{Value, json};

/// Register `name` as reversible, capturing the context of every run.
fn capturing(history: &History, name: &str, required: &[&str]) -> Arc<Mutex<Vec<Context>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    history.action(
        name,
        move |_parameters: Value, context: Context| {
            sink.lock().unwrap().push(context);
            async { Ok(Some(Undo::from_fn(|| Ok(())))) }
        },
        required,
    );
    seen
}

#[tokio::test]
async fn exec_waits_for_required_context() {
    let history = History::new();
    let seen = capturing(&history, "rename", &["user"]);
    history.context("theme", json!("dark"));

    let mut exec = Box::pin(history.exec("rename", json!({ "to": "draft" })));
    assert!((&mut exec).now_or_never().is_none());
    assert!(seen.lock().unwrap().is_empty());

    history.context("user", json!("ada"));
    exec.await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], Context::from([("user".to_string(), json!("ada"))]));
}

#[tokio::test]
async fn context_removed_with_none_gates_again() {
    let history = History::new();
    capturing(&history, "save", &["document"]);

    history.context("document", json!("a.md"));
    history.exec("save", Value::Null).await.unwrap();

    history.context("document", None);
    assert!(!history.has_context("document"));
    let mut exec = Box::pin(history.exec("save", Value::Null));
    assert!((&mut exec).now_or_never().is_none());

    history.context("document", json!("b.md"));
    exec.await.unwrap();
    assert_eq!(history.undo_depth(), 2);
}

#[tokio::test]
async fn recorded_context_is_a_snapshot() {
    let history = History::new();
    capturing(&history, "rename", &["user"]);

    history.context("user", json!("ada"));
    history.exec("rename", Value::Null).await.unwrap();
    history.context("user", json!("grace"));

    let last = history.last(1);
    assert_eq!(last[0].context["user"], json!("ada"));
}

#[tokio::test]
async fn redo_reuses_recorded_context() {
    let history = History::new();
    let seen = capturing(&history, "rename", &["user"]);

    history.context("user", json!("ada"));
    history.exec("rename", Value::Null).await.unwrap();
    history.undo(1).await.unwrap();
    history.context("user", json!("grace"));
    history.redo(1).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1]["user"], json!("ada"));
}

#[tokio::test]
async fn log_snapshots_cannot_mutate_history() {
    let history = History::new();
    capturing(&history, "rename", &[]);
    history.exec("rename", json!({ "to": "draft" })).await.unwrap();

    let mut snapshot = history.last(1);
    snapshot[0].parameters["to"] = json!("final");
    snapshot[0].context.insert("user".into(), json!("mallory"));
    snapshot[0].name.push_str("-edited");

    let fresh = history.last(1);
    assert_eq!(fresh[0].name, "rename");
    assert_eq!(fresh[0].parameters, json!({ "to": "draft" }));
    assert!(fresh[0].context.is_empty());
}

#[tokio::test]
async fn late_registration_overwrites_handler() {
    let history = History::new();
    let first = capturing(&history, "op", &[]);
    let second = capturing(&history, "op", &[]);

    history.exec("op", Value::Null).await.unwrap();
    assert!(first.lock().unwrap().is_empty());
    assert_eq!(second.lock().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn context_supplied_from_another_task() {
    let history = History::new();
    capturing(&history, "publish", &["user", "document"]);

    let exec = {
        let history = history.clone();
        tokio::spawn(async move { history.exec("publish", Value::Null).await })
    };

    let producer = {
        let history = history.clone();
        tokio::spawn(async move {
            history.context("document", json!("notes.md"));
            tokio::task::yield_now().await;
            history.context("user", json!("ada"));
        })
    };

    producer.await.unwrap();
    exec.await.unwrap().unwrap();

    let last = history.last(1);
    assert_eq!(last[0].context.len(), 2);
    assert_eq!(last[0].context["document"], json!("notes.md"));
}

#[tokio::test]
async fn exec_joins_context_read_when_called() {
    let history = History::new();
    let seen = capturing(&history, "rename", &["user"]);

    let exec = history.exec("rename", Value::Null);
    history.context("user", json!("ada"));
    history.context("user", None);
    exec.await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0]["user"], json!("ada"));
}
