//! HTTP server startup with lifecycle management and graceful shutdown.

mod error;
mod http_server;
mod lifecycle;
mod shutdown;

pub use error::{ServerError, ServerResult};
pub use http_server::serve_http as serve;
use lifecycle::serve_with_shutdown;
use shutdown::{drain_within, shutdown_trigger};
