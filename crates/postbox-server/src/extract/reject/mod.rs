//! Extractors whose rejections are rendered as JSON error responses.
//!
//! Drop-in replacements for the matching axum extractors; handlers use them so
//! that every client error carries the same body shape.

pub mod enhanced_json;
pub mod enhanced_path;

pub use self::enhanced_json::Json;
pub use self::enhanced_path::Path;
