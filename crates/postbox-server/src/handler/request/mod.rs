//! Request types for HTTP handlers.

mod messages;

pub use messages::*;
