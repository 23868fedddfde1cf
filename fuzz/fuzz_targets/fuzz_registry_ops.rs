#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use futures::FutureExt;
use libfuzzer_sys::fuzz_target;
use rewind_registry::Registry;

const KEYS: [&str; 8] = ["k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7"];

fn key(k: &u8) -> &'static str {
    KEYS[usize::from(*k) % KEYS.len()]
}

#[derive(Debug, Arbitrary)]
enum Op {
    Set(u8, Option<u16>),
    Unset(u8),
    Patch(Vec<(u8, Option<u16>)>),
    Read(u8),
}

fuzz_target!(|ops: Vec<Op>| {
    let registry = Registry::<u16>::new();
    let mut model: HashMap<&str, u16> = HashMap::new();
    let mut parked = Vec::new();

    for op in ops.iter().take(512) {
        match op {
            Op::Set(k, value) => {
                registry.set(key(k), *value);
                match value {
                    Some(v) => {
                        model.insert(key(k), *v);
                    }
                    None => {
                        model.remove(key(k));
                    }
                }
            }
            Op::Unset(k) => {
                registry.unset(key(k));
                model.remove(key(k));
            }
            Op::Patch(entries) => {
                registry.patch(entries.iter().map(|(k, v)| (key(k), *v)));
                for (k, v) in entries {
                    if let Some(v) = v {
                        model.insert(key(k), *v);
                    }
                }
            }
            Op::Read(k) => {
                let mut read = Box::pin(registry.get(key(k)));
                match (&mut read).now_or_never() {
                    Some(value) => assert_eq!(value.ok(), model.get(key(k)).copied()),
                    None => {
                        assert!(!model.contains_key(key(k)));
                        assert!(registry.is_pending(key(k)));
                        parked.push((key(k), read));
                    }
                }
            }
        }

        for k in KEYS {
            assert_eq!(registry.peek(k), model.get(k).copied());
            assert_eq!(registry.has(k), model.contains_key(k));
        }
    }

    // A parked read resolves once its slot is defined.
    for (k, read) in parked {
        if model.contains_key(k) {
            assert!(read.now_or_never().is_some());
        }
    }
});
