#![forbid(unsafe_code)]

//! Synchronous publish/subscribe event dispatcher.
//!
//! ```ignore
//! use rewind_events::Emitter;
//!
//! let emitter: Emitter<&str, String> = Emitter::new();
//! let id = emitter.on(["saved"], |path| println!("saved {path}"));
//! emitter.emit(["saved"], &"notes.md".to_string());
//! emitter.off(["saved"], id);
//! ```

pub mod emitter;

pub use emitter::{Emitter, HandlerId};
