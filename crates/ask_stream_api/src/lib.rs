//! Transport-only client primitives for the document chat `/ask_stream` endpoint.
//!
//! This crate owns request building, retrying, timeout enforcement and SSE frame
//! decoding. It contains no message-list state and no token persistence; callers
//! pass a ready bearer token through [`AskStreamConfig`].
//!
//! Frame payloads are normalized into [`AskStreamEvent`]. Citation entries are
//! carried through untouched as JSON values so the caller decides how to validate
//! them.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::{AskStreamClient, CancellationSignal, StreamResult};
pub use config::AskStreamConfig;
pub use error::AskStreamError;
pub use events::AskStreamEvent;
pub use payload::AskStreamRequest;
pub use retry::RetryPolicy;
pub use sse::SseStreamParser;
pub use url::normalize_ask_stream_url;
