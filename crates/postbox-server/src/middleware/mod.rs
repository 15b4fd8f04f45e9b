//! Middleware for `axum::Router` and HTTP request processing.
//!
//! Each concern is an extension trait on the router:
//!
//! ```rust,no_run
//! use postbox_server::handler::router;
//! use postbox_server::middleware::{
//!     OpenApiConfig, RecoveryConfig, RouterObservabilityExt, RouterRecoveryExt,
//! };
//! # fn build(state: postbox_server::service::ServiceState) -> axum::Router {
//! router(state, OpenApiConfig::default())
//!     .with_observability()
//!     .with_recovery(&RecoveryConfig::default())
//! # }
//! ```

mod observability;
mod recovery;
mod specification;

pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use specification::{OpenApiConfig, RouterOpenApiExt};
