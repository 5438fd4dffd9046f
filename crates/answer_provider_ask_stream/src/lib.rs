//! `ask_stream_api`-backed implementation of the `answer_provider` contract.
//!
//! Decoded frames are forwarded as `StreamEvent`s while the body is still being
//! read, so hosts see partial answers as they arrive.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use answer_provider::{
    AnswerProvider, AskRequest, CancelSignal, ProviderInitError, ProviderProfile, StreamEvent,
    StreamId,
};
use ask_stream_api::{
    AskStreamClient, AskStreamConfig, AskStreamError, AskStreamEvent, AskStreamRequest,
    RetryPolicy,
};
use tracing::warn;

/// Stable provider identifier used for startup selection.
pub const ASK_STREAM_PROVIDER_ID: &str = "ask-stream";

const TRUNCATED_STREAM_MESSAGE: &str = "The answer ended unexpectedly. Please try again.";

/// Runtime configuration for the ask-stream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskStreamProviderConfig {
    pub access_token: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
}

impl AskStreamProviderConfig {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: None,
            timeout: None,
            retry: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    fn into_ask_stream_config(self) -> AskStreamConfig {
        let mut config = AskStreamConfig::new(self.access_token);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        if let Some(retry) = self.retry {
            config = config.with_retry(retry);
        }

        config
    }
}

trait StreamClient: Send + Sync {
    fn endpoint(&self) -> String;

    /// Returns whether the stream reached `done`.
    fn stream(
        &self,
        request: &AskStreamRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(AskStreamEvent),
    ) -> Result<bool, AskStreamError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: AskStreamClient,
}

impl StreamClient for DefaultStreamClient {
    fn endpoint(&self) -> String {
        self.client.endpoint()
    }

    fn stream(
        &self,
        request: &AskStreamRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(AskStreamEvent),
    ) -> Result<bool, AskStreamError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                AskStreamError::Runtime(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(
            self.client
                .stream_with_handler(request, Some(cancel), |event| on_event(event)),
        )
    }
}

/// `AnswerProvider` adapter backed by the `/ask_stream` endpoint.
pub struct AskStreamProvider {
    stream_client: Arc<dyn StreamClient>,
}

impl AskStreamProvider {
    pub fn new(config: AskStreamProviderConfig) -> Result<Self, ProviderInitError> {
        let client = AskStreamClient::new(config.into_ask_stream_config()).map_err(map_init_error)?;
        // Fail fast on a missing token rather than on the first question.
        client.build_headers().map_err(map_init_error)?;

        Ok(Self {
            stream_client: Arc::new(DefaultStreamClient { client }),
        })
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(stream_client: Arc<dyn StreamClient>) -> Self {
        Self { stream_client }
    }
}

impl AnswerProvider for AskStreamProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: ASK_STREAM_PROVIDER_ID.to_string(),
            endpoint: self.stream_client.endpoint(),
        }
    }

    fn run(
        &self,
        req: AskRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), String> {
        let stream_id = req.stream_id;

        emit(StreamEvent::Started { stream_id });

        if cancel.load(Ordering::Acquire) {
            emit(StreamEvent::Cancelled { stream_id });
            return Ok(());
        }

        let request = AskStreamRequest::new(req.query, req.chat_id)
            .with_indices(req.indices)
            .with_filter_dimensions(req.filter_dimensions);

        let outcome = self.stream_client.stream(&request, &cancel, &mut |event| {
            if let Some(event) = map_stream_event(stream_id, event) {
                emit(event);
            }
        });

        match outcome {
            Ok(true) => emit(StreamEvent::Finished { stream_id }),
            Ok(false) => {
                warn!(stream_id, "answer stream ended without done frame");
                emit(StreamEvent::Failed {
                    stream_id,
                    error: TRUNCATED_STREAM_MESSAGE.to_string(),
                });
            }
            Err(AskStreamError::Cancelled) => emit(StreamEvent::Cancelled { stream_id }),
            Err(error) => {
                warn!(stream_id, %error, "answer stream failed");
                emit(StreamEvent::Failed {
                    stream_id,
                    error: error.user_message(),
                });
            }
        }

        Ok(())
    }
}

fn map_stream_event(stream_id: StreamId, event: AskStreamEvent) -> Option<StreamEvent> {
    match event {
        AskStreamEvent::Content { text } if !text.is_empty() => {
            Some(StreamEvent::Content { stream_id, text })
        }
        AskStreamEvent::Citations { cited_sections } => Some(StreamEvent::Citations {
            stream_id,
            entries: cited_sections,
        }),
        // Terminal frames are reported once the client returns.
        AskStreamEvent::Content { .. } | AskStreamEvent::Error { .. } | AskStreamEvent::Done => {
            None
        }
    }
}

fn map_init_error(error: AskStreamError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize ask-stream provider: {error}"))
}
