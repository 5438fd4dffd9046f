//! Provider-agnostic contract for streaming one answer.
//!
//! Hosts hand a provider an [`AskRequest`] plus a cancellation flag and receive
//! [`StreamEvent`]s through a callback, in provider order, on the calling thread.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

use serde_json::Value;

/// Identifier for one answer stream. Assigned by the host, strictly increasing.
pub type StreamId = u64;

/// Shared cancellation flag for a stream.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing a provider before any stream starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Input required to start an answer stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AskRequest {
    pub stream_id: StreamId,
    pub chat_id: String,
    pub query: String,
    pub indices: Vec<String>,
    pub filter_dimensions: Value,
}

impl AskRequest {
    /// Request with no index restriction and empty filters.
    #[must_use]
    pub fn new(stream_id: StreamId, chat_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            stream_id,
            chat_id: chat_id.into(),
            query: query.into(),
            indices: Vec::new(),
            filter_dimensions: Value::Object(Default::default()),
        }
    }

    #[must_use]
    pub fn with_indices<I, S>(mut self, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices = indices.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_filter_dimensions(mut self, filter_dimensions: Value) -> Self {
        self.filter_dimensions = filter_dimensions;
        self
    }
}

/// Provider-emitted lifecycle event for one stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Started { stream_id: StreamId },
    Content { stream_id: StreamId, text: String },
    /// Raw citation entries; each is an object or a JSON-encoded string.
    Citations { stream_id: StreamId, entries: Vec<Value> },
    Finished { stream_id: StreamId },
    Failed { stream_id: StreamId, error: String },
    Cancelled { stream_id: StreamId },
}

impl StreamEvent {
    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        match self {
            Self::Started { stream_id }
            | Self::Content { stream_id, .. }
            | Self::Citations { stream_id, .. }
            | Self::Finished { stream_id }
            | Self::Failed { stream_id, .. }
            | Self::Cancelled { stream_id } => *stream_id,
        }
    }

    /// Returns true when this event ends the stream lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Immutable metadata describing an answer provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub endpoint: String,
}

/// Provider interface for executing one answer stream.
pub trait AnswerProvider: Send + Sync + 'static {
    fn profile(&self) -> ProviderProfile;

    /// Runs the stream to completion, emitting events in arrival order.
    ///
    /// Exactly one terminal event is emitted per call unless the provider fails
    /// before `Started`, in which case the error is returned instead.
    fn run(
        &self,
        req: AskRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), String>;
}
