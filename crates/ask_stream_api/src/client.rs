use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::AskStreamConfig;
use crate::error::{parse_error_message, AskStreamError};
use crate::events::AskStreamEvent;
use crate::headers::build_headers;
use crate::payload::AskStreamRequest;
use crate::sse::SseStreamParser;
use crate::url::normalize_ask_stream_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct AskStreamClient {
    http: Client,
    config: AskStreamConfig,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub events: Vec<AskStreamEvent>,
    /// Whether a `done` frame was received before the body ended.
    pub completed: bool,
}

impl AskStreamClient {
    pub fn new(config: AskStreamConfig) -> Result<Self, AskStreamError> {
        let http = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(AskStreamError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AskStreamConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        normalize_ask_stream_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, AskStreamError> {
        let headers = build_headers(&self.config)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| AskStreamError::InvalidHeader(format!("key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| AskStreamError::InvalidHeader(format!("value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &AskStreamRequest,
    ) -> Result<reqwest::RequestBuilder, AskStreamError> {
        let headers = self.build_headers()?;
        Ok(self.http.post(self.endpoint()).headers(headers).json(request))
    }

    /// Open the answer stream, retrying transport failures and non-2xx statuses.
    ///
    /// At most `retry.max_attempts()` requests are issued with a fixed backoff in
    /// between. The connect phase as a whole, backoff included, must finish within
    /// `timeout`. Cancellation is returned as soon as it is observed and is never
    /// retried.
    pub async fn send_with_retry(
        &self,
        request: &AskStreamRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, AskStreamError> {
        let policy = self.config.retry;
        let deadline = Instant::now() + self.config.timeout;
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 0..policy.max_attempts() {
            if is_cancelled(cancellation) {
                return Err(AskStreamError::Cancelled);
            }

            attempts += 1;
            let response = self.build_request(request)?.send();
            let response = self.bounded(response, deadline, cancellation).await?;

            match response {
                Ok(response) if response.status().is_success() => {
                    debug!(attempt = attempts, status = %response.status(), "answer stream opened");
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status);
                    let body = self
                        .bounded(response.text(), deadline, cancellation)
                        .await?
                        .unwrap_or_default();
                    let message = parse_error_message(status, &body);
                    debug!(attempt = attempts, %status, %message, "answer stream request rejected");
                    last_error = Some(message);
                }
                Err(error) => {
                    debug!(attempt = attempts, %error, "answer stream request failed");
                    last_error = Some(error.to_string());
                }
            }

            if !policy.should_retry(attempt) {
                break;
            }
            self.bounded(tokio::time::sleep(policy.delay(attempt)), deadline, cancellation)
                .await?;
        }

        Err(AskStreamError::RetryExhausted {
            status: last_status,
            last_error,
            attempts,
        })
    }

    /// Stream the answer, handing each decoded event to `on_event` in arrival order.
    ///
    /// Returns whether the stream reached `done`. An `error` frame ends the stream
    /// with [`AskStreamError::StreamFailed`] and is not passed to `on_event`. Each
    /// body read must produce data within `timeout`.
    pub async fn stream_with_handler<F>(
        &self,
        request: &AskStreamRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<bool, AskStreamError>
    where
        F: FnMut(AskStreamEvent),
    {
        let response = self.send_with_retry(request, cancellation).await?;
        info!(chat_id = %request.chat_id, "answer stream started");

        let mut bytes = response.bytes_stream();
        let mut parser = SseStreamParser::default();

        loop {
            let deadline = Instant::now() + self.config.timeout;
            let Some(chunk) = self.bounded(bytes.next(), deadline, cancellation).await? else {
                break;
            };
            let chunk = chunk.map_err(AskStreamError::from)?;
            for event in parser.feed(&chunk) {
                if process_stream_event(event, &mut on_event)? {
                    return Ok(true);
                }
            }
        }

        if let Some(event) = parser.finish() {
            if process_stream_event(event, &mut on_event)? {
                return Ok(true);
            }
        }

        debug!(
            skipped = parser.skipped_frames(),
            "answer stream ended without done frame"
        );
        Ok(false)
    }

    pub async fn stream(
        &self,
        request: &AskStreamRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, AskStreamError> {
        let mut events = Vec::new();
        let completed = self
            .stream_with_handler(request, cancellation, |event| {
                events.push(event);
            })
            .await?;

        Ok(StreamResult { events, completed })
    }

    async fn bounded<F>(
        &self,
        future: F,
        deadline: Instant,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<F::Output, AskStreamError>
    where
        F: Future,
    {
        await_until(future, deadline, cancellation)
            .await
            .map_err(|expired| expired.into_error(self.config.timeout))
    }
}

/// Returns `true` once the stream has reached its terminal success frame.
fn process_stream_event<F>(event: AskStreamEvent, on_event: &mut F) -> Result<bool, AskStreamError>
where
    F: FnMut(AskStreamEvent),
{
    if let AskStreamEvent::Error { message } = &event {
        return Err(AskStreamError::StreamFailed {
            message: message
                .clone()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "The server could not answer this question.".to_owned()),
        });
    }

    let done = matches!(event, AskStreamEvent::Done);
    on_event(event);
    Ok(done)
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

enum Interrupted {
    Cancelled,
    Expired,
}

impl Interrupted {
    fn into_error(self, timeout: Duration) -> AskStreamError {
        match self {
            Self::Cancelled => AskStreamError::Cancelled,
            Self::Expired => AskStreamError::Timeout(timeout),
        }
    }
}

async fn await_until<F>(
    future: F,
    deadline: Instant,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(Interrupted::Cancelled);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Interrupted::Expired);
        }

        let slice = if cancellation.is_some() {
            CANCEL_POLL_INTERVAL.min(deadline - now)
        } else {
            deadline - now
        };

        if let Ok(output) = tokio::time::timeout(slice, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(Interrupted::Cancelled);
            }
            return Ok(output);
        }
    }
}
