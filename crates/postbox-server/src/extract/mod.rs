//! Request extractors used by the relay handlers.

pub mod reject;

pub use crate::extract::reject::{Json, Path};
