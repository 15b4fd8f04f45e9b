//! Response types for HTTP handlers.

mod errors;
mod messages;
mod monitors;

pub use errors::*;
pub use messages::*;
pub use monitors::*;
