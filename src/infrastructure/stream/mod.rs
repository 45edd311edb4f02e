//! Event stream infrastructure

mod jsonl;

pub use jsonl::JsonlStreamEmitter;
