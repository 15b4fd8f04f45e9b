//! In-memory implementations of the relay backends.
//!
//! Both doubles are cheap to clone and share their state between clones,
//! so a test can hand one clone to the relay and inspect another.

mod queue;
mod storage;

pub use queue::MemoryQueue;
pub use storage::MemoryStorage;
