//! NATS JetStream object storage.
//!
//! Each relay bucket maps to one JetStream object store bucket, created on first
//! use. Uploads stream through [`HashingReader`] so the SHA-256 digest of every
//! stored payload is known without buffering it twice.

mod bucket_storage;
mod hashing_reader;
mod object_data;
mod object_store;

pub use bucket_storage::NatsObjectStorage;
pub use hashing_reader::HashingReader;
pub use object_data::PutResult;
pub use object_store::ObjectStore;
