#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for in-memory test doubles.
pub const TRACING_TARGET: &str = "postbox_test";

mod environment;
mod mock;

pub use environment::EphemeralEnvironment;
pub use mock::{MemoryQueue, MemoryStorage};
