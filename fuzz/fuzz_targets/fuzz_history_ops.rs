#![no_main]

use arbitrary::Arbitrary;
use futures::FutureExt;
use futures::executor::block_on;
use libfuzzer_sys::fuzz_target;
use rewind_history::{ActionError, History, HistoryConfig, REDO_ACTION, UNDO_ACTION, Undo};
use serde_json::{Value, json};

#[derive(Debug, Arbitrary)]
enum Op {
    Exec(u8),
    ExecIrreversible,
    ExecFailing,
    ExecGated,
    SetContext(Option<u8>),
    Undo(u8),
    Redo(u8),
    BuiltinUndo(u8),
    BuiltinRedo(u8),
    Clear,
}

#[derive(Debug, Arbitrary)]
struct Input {
    limit: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let limit = usize::from(input.limit % 16).max(1);
    let history = History::with_config(HistoryConfig::new(limit));
    history.action::<_, _, &str>(
        "edit",
        |_, _| async { Ok(Some(Undo::from_fn(|| Ok(())))) },
        &[],
    );
    history.action::<_, _, &str>("notify", |_, _| async { Ok(None) }, &[]);
    history.action::<_, _, &str>(
        "broken",
        |_, _| async { Err::<Option<Undo>, ActionError>("rejected".into()) },
        &[],
    );
    history.action(
        "gated",
        |_, _| async { Ok(Some(Undo::from_fn(|| Ok(())))) },
        &["user"],
    );

    for op in input.ops.iter().take(256) {
        let total_before = history.undo_depth() + history.redo_depth();
        match op {
            Op::Exec(n) => {
                block_on(history.exec("edit", json!({ "n": n }))).unwrap();
                assert_eq!(history.redo_depth(), 0);
            }
            Op::ExecIrreversible => {
                let redo_before = history.redo_depth();
                block_on(history.exec("notify", Value::Null)).unwrap();
                assert_eq!(history.redo_depth(), redo_before);
            }
            Op::ExecFailing => {
                let redo_before = history.redo_depth();
                assert!(block_on(history.exec("broken", Value::Null)).is_err());
                assert_eq!(history.redo_depth(), redo_before);
            }
            Op::ExecGated => {
                // Without "user" the exec parks; dropping it records nothing.
                let ready = history.has_context("user");
                let outcome = history.exec("gated", Value::Null).now_or_never();
                assert_eq!(outcome.is_some(), ready);
            }
            Op::SetContext(value) => {
                history.context("user", value.map(|v| json!(v)));
            }
            Op::Undo(steps) => {
                block_on(history.undo(usize::from(*steps % 8))).unwrap();
                assert_eq!(history.undo_depth() + history.redo_depth(), total_before);
            }
            Op::Redo(steps) => {
                block_on(history.redo(usize::from(*steps % 8))).unwrap();
                assert_eq!(history.undo_depth() + history.redo_depth(), total_before);
            }
            Op::BuiltinUndo(steps) => {
                let parameters = json!({ "steps": steps % 8 });
                block_on(history.exec(UNDO_ACTION, parameters)).unwrap();
            }
            Op::BuiltinRedo(steps) => {
                let parameters = json!({ "steps": steps % 8 });
                block_on(history.exec(REDO_ACTION, parameters)).unwrap();
            }
            Op::Clear => history.clear(),
        }

        assert!(history.undo_depth() <= limit, "done log exceeds limit");
        assert!(history.undo_depth() + history.redo_depth() <= limit);
        assert_eq!(history.last(usize::MAX).len(), history.undo_depth());
        assert_eq!(history.last_undone(usize::MAX).len(), history.redo_depth());
    }
});
