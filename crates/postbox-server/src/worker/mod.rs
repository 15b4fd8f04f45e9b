//! Background workers started alongside the HTTP server.

mod consumer;

pub use consumer::ConsumerWorker;
