#![forbid(unsafe_code)]

//! Failure semantics of exec/undo/redo.
//!
//! Validates:
//! - Handler errors reach the caller unmodified.
//! - A failed exec records nothing and keeps the undone log (the redo branch
//!   survives a failed attempt, unlike a successful exec).
//! - A failing undo callback leaves its entry at the head of the done log.
//! - A failing redo leaves its entry at the head of the undone log.
//!
//! Run:
//!   cargo test -p rewind-history --test failure_semantics

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rewind_history::{ActionError, Context, History, HistoryError, Undo};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
#[error("quota exceeded: {0}")]
struct QuotaExceeded(u32);

fn reversible(history: &History, name: &str) {
    history.action::<_, _, &str>(
        name,
        |_, _| async { Ok(Some(Undo::from_fn(|| Ok(())))) },
        &[],
    );
}

fn names(history: &History) -> (Vec<String>, Vec<String>) {
    (
        history.last(100).into_iter().map(|l| l.name).collect(),
        history.last_undone(100).into_iter().map(|l| l.name).collect(),
    )
}

#[tokio::test]
async fn handler_error_propagates_unmodified() {
    let history = History::new();
    history.action::<_, _, &str>(
        "upload",
        |_, _| async { Err::<Option<Undo>, ActionError>(Box::new(QuotaExceeded(3))) },
        &[],
    );

    let err = history.exec("upload", Value::Null).await.unwrap_err();
    assert_eq!(err.to_string(), "quota exceeded: 3");
    let source = err.action_error().expect("action error");
    assert_eq!(source.downcast_ref::<QuotaExceeded>().map(|q| q.0), Some(3));
    assert!(!history.can_undo());
}

#[tokio::test]
async fn failed_exec_keeps_redo_branch() {
    let history = History::new();
    reversible(&history, "a");
    reversible(&history, "b");
    history.action::<_, _, &str>(
        "broken",
        |_, _| async { Err::<Option<Undo>, ActionError>("boom".into()) },
        &[],
    );

    history.exec("a", Value::Null).await.unwrap();
    history.exec("b", Value::Null).await.unwrap();
    history.undo(1).await.unwrap();

    assert!(history.exec("broken", Value::Null).await.is_err());
    assert_eq!(names(&history), (vec!["a".into()], vec!["b".into()]));

    history.redo(1).await.unwrap();
    assert_eq!(names(&history), (vec!["b".into(), "a".into()], vec![]));
}

#[tokio::test]
async fn unknown_action_keeps_logs() {
    let history = History::new();
    reversible(&history, "a");
    history.exec("a", Value::Null).await.unwrap();
    history.undo(1).await.unwrap();

    let err = history.exec("nope", json!({})).await.unwrap_err();
    assert!(matches!(err, HistoryError::UnknownAction(ref name) if name == "nope"));
    assert_eq!(history.redo_depth(), 1);
}

#[tokio::test]
async fn irreversible_exec_keeps_redo_branch() {
    let history = History::new();
    reversible(&history, "a");
    history.action::<_, _, &str>("notify", |_, _| async { Ok(None) }, &[]);

    history.exec("a", Value::Null).await.unwrap();
    history.undo(1).await.unwrap();
    history.exec("notify", Value::Null).await.unwrap();

    assert_eq!(history.redo_depth(), 1);
}

#[tokio::test]
async fn failing_undo_keeps_entry_done() {
    let history = History::new();
    let fail = Arc::new(AtomicBool::new(true));
    let undos = Arc::new(AtomicUsize::new(0));
    {
        let (fail, undos) = (Arc::clone(&fail), Arc::clone(&undos));
        history.action::<_, _, &str>(
            "edit",
            move |_, _| {
                let (fail, undos) = (Arc::clone(&fail), Arc::clone(&undos));
                async move {
                    Ok(Some(Undo::from_fn(move || {
                        if fail.load(Ordering::SeqCst) {
                            return Err("locked".into());
                        }
                        undos.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })))
                }
            },
            &[],
        );
    }
    reversible(&history, "first");

    history.exec("first", Value::Null).await.unwrap();
    history.exec("edit", Value::Null).await.unwrap();

    let err = history.undo(2).await.unwrap_err();
    assert_eq!(err.to_string(), "locked");
    assert_eq!(names(&history), (vec!["edit".into(), "first".into()], vec![]));

    fail.store(false, Ordering::SeqCst);
    history.undo(2).await.unwrap();
    assert_eq!(undos.load(Ordering::SeqCst), 1);
    assert_eq!(names(&history), (vec![], vec!["first".into(), "edit".into()]));
}

#[tokio::test]
async fn failing_redo_keeps_entry_undone() {
    let history = History::new();
    let runs = Arc::new(AtomicUsize::new(0));
    {
        let runs = Arc::clone(&runs);
        history.action::<_, _, &str>(
            "flaky",
            move |_: Value, _: Context| {
                let attempt = runs.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        return Err::<Option<Undo>, ActionError>("transient".into());
                    }
                    Ok(Some(Undo::from_fn(|| Ok(()))))
                }
            },
            &[],
        );
    }

    history.exec("flaky", Value::Null).await.unwrap();
    history.undo(1).await.unwrap();

    assert!(history.redo(1).await.is_err());
    assert_eq!(history.redo_depth(), 1);
    assert_eq!(history.undo_depth(), 0);

    history.redo(1).await.unwrap();
    assert_eq!(history.redo_depth(), 0);
    assert_eq!(history.undo_depth(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn redo_of_action_turned_irreversible_drops_entry() {
    let history = History::new();
    let reversible_now = Arc::new(AtomicBool::new(true));
    {
        let reversible_now = Arc::clone(&reversible_now);
        history.action::<_, _, &str>(
            "toggle",
            move |_, _| {
                let keep = reversible_now.load(Ordering::SeqCst);
                async move { Ok(keep.then(|| Undo::from_fn(|| Ok(())))) }
            },
            &[],
        );
    }

    history.exec("toggle", Value::Null).await.unwrap();
    history.undo(1).await.unwrap();
    reversible_now.store(false, Ordering::SeqCst);
    history.redo(1).await.unwrap();

    assert!(!history.can_undo());
    assert!(!history.can_redo());
}
