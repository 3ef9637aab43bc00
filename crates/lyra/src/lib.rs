//! Lyra - Streaming chat relay server
//!
//! This crate provides an HTTP server that relays chat turns to an
//! OpenAI-compatible streaming completion endpoint, optionally augments the
//! prompt with web-search results, streams incremental output back to the
//! caller as newline-delimited JSON, and persists a bounded conversation
//! history.

pub mod config;
pub mod context;
pub mod error;
pub mod relay;
pub mod search;
pub mod server;
pub mod store;

pub use error::LyraError;
