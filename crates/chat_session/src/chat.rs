use answer_provider::StreamId;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::accumulator::StreamAccumulator;
use crate::citations::parse_cited_sections;
use crate::ids::MessageIdGenerator;
use crate::message::{Message, RetryRequest};

const FALLBACK_ERROR_TEXT: &str = "Something went wrong while answering. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Idle,
    /// Request issued, no event seen yet.
    Sending { stream_id: StreamId },
    Streaming { stream_id: StreamId },
    Errored(String),
}

/// Correlates a stream with the chat it was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSession {
    pub stream_id: StreamId,
    pub chat_id: String,
    pub started_at: OffsetDateTime,
}

/// The single in-flight question and answer pair of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub session: StreamSession,
    pub ai_message_id: String,
    pub request: RetryRequest,
}

/// Side effects the view asks its host to perform.
pub trait HostOps {
    fn start_stream(&mut self, chat_id: &str, request: &RetryRequest) -> Result<StreamId, String>;
    fn abort_stream(&mut self, stream_id: StreamId);
    fn request_render(&mut self);
}

/// Message list of one chat plus the state of its active answer stream.
///
/// At most one exchange is active. Every stream callback is ignored unless it
/// carries the active stream id and the exchange still belongs to the visible
/// chat.
#[derive(Debug, Clone)]
pub struct ChatView {
    pub mode: Mode,
    pub messages: Vec<Message>,
    chat_id: String,
    exchange: Option<Exchange>,
    accumulator: StreamAccumulator,
    ids: MessageIdGenerator,
}

impl ChatView {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self::with_history(chat_id, Vec::new())
    }

    pub fn with_history(chat_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            mode: Mode::Idle,
            messages,
            chat_id: chat_id.into(),
            exchange: None,
            accumulator: StreamAccumulator::default(),
            ids: MessageIdGenerator::new(),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        self.exchange.as_ref()
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.accumulator
    }

    pub fn active_stream_id(&self) -> Option<StreamId> {
        self.exchange
            .as_ref()
            .map(|exchange| exchange.session.stream_id)
    }

    pub fn is_busy(&self) -> bool {
        self.exchange.is_some()
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().rev().find(|message| message.id == id)
    }

    /// Send a question. Blank queries are ignored.
    ///
    /// An exchange still in flight is aborted first and its placeholder is
    /// settled with whatever text it already shows.
    pub fn submit(
        &mut self,
        query: &str,
        indices: Vec<String>,
        filter_dimensions: Value,
        host: &mut dyn HostOps,
    ) {
        let query = query.trim();
        if query.is_empty() {
            host.request_render();
            return;
        }

        if let Some(previous) = self.exchange.take() {
            debug!(
                stream_id = previous.session.stream_id,
                "superseding active exchange"
            );
            host.abort_stream(previous.session.stream_id);
            self.settle_placeholder(&previous.ai_message_id);
        }
        self.accumulator.reset();

        let request = RetryRequest::new(query, indices, filter_dimensions);
        let user_id = self.ids.next_id();
        let ai_message_id = self.ids.next_id();
        self.messages.push(Message::user(user_id, query));
        self.messages.push(Message::ai_placeholder(ai_message_id.clone()));

        match host.start_stream(&self.chat_id, &request) {
            Ok(stream_id) => {
                self.accumulator.begin(ai_message_id.clone());
                self.exchange = Some(Exchange {
                    session: StreamSession {
                        stream_id,
                        chat_id: self.chat_id.clone(),
                        started_at: OffsetDateTime::now_utc(),
                    },
                    ai_message_id,
                    request,
                });
                self.mode = Mode::Sending { stream_id };
            }
            Err(error) => {
                self.mark_failed(&ai_message_id, &error, request);
                self.mode = Mode::Errored(error);
            }
        }

        host.request_render();
    }

    /// Resend the question carried by a failed AI message.
    ///
    /// Returns `false` when `message_id` does not name a retryable message.
    pub fn retry(&mut self, message_id: &str, host: &mut dyn HostOps) -> bool {
        let Some(request) = self
            .message(message_id)
            .filter(|message| message.can_retry())
            .and_then(|message| message.retry.clone())
        else {
            return false;
        };

        self.submit(
            &request.query,
            request.indices,
            request.filter_dimensions,
            host,
        );
        true
    }

    /// Retry the most recent failed answer, if any.
    pub fn retry_last(&mut self, host: &mut dyn HostOps) -> bool {
        let Some(message_id) = self
            .messages
            .iter()
            .rev()
            .find(|message| message.can_retry())
            .map(|message| message.id.clone())
        else {
            return false;
        };

        self.retry(&message_id, host)
    }

    /// Stop the active stream, keeping the partial answer already shown.
    pub fn cancel(&mut self, host: &mut dyn HostOps) -> bool {
        let Some(exchange) = self.exchange.take() else {
            return false;
        };

        host.abort_stream(exchange.session.stream_id);
        self.settle_placeholder(&exchange.ai_message_id);
        self.accumulator.reset();
        self.mode = Mode::Idle;
        host.request_render();
        true
    }

    /// Replace the view with another chat's history.
    ///
    /// The active stream is aborted and nothing it emits afterwards reaches
    /// either message list.
    pub fn switch_chat(
        &mut self,
        chat_id: impl Into<String>,
        history: Vec<Message>,
        host: &mut dyn HostOps,
    ) {
        self.abort_active(host);
        self.chat_id = chat_id.into();
        self.messages = history;
        host.request_render();
    }

    /// Abort any outstanding stream when the view goes away.
    pub fn teardown(&mut self, host: &mut dyn HostOps) {
        self.abort_active(host);
    }

    pub fn on_stream_started(&mut self, stream_id: StreamId) {
        if !self.is_current(stream_id) {
            return;
        }

        self.mode = Mode::Streaming { stream_id };
    }

    pub fn on_content(&mut self, stream_id: StreamId, delta: &str) {
        if !self.is_current(stream_id) {
            return;
        }

        self.accumulator.push_content(delta);
        self.mode = Mode::Streaming { stream_id };
        self.sync_placeholder(true);
    }

    pub fn on_citations(&mut self, stream_id: StreamId, entries: &[Value]) {
        if !self.is_current(stream_id) {
            return;
        }

        self.accumulator
            .replace_citations(parse_cited_sections(entries));
        self.mode = Mode::Streaming { stream_id };
        self.sync_placeholder(true);
    }

    pub fn on_finished(&mut self, stream_id: StreamId) {
        if !self.is_current(stream_id) {
            return;
        }

        self.sync_placeholder(false);
        info!(
            stream_id,
            chars = self.accumulator.text().len(),
            citations = self.accumulator.citations().len(),
            "answer complete"
        );
        self.exchange = None;
        self.accumulator.reset();
        self.mode = Mode::Idle;
    }

    pub fn on_failed(&mut self, stream_id: StreamId, error: &str) {
        if !self.is_current(stream_id) {
            return;
        }

        let Some(exchange) = self.exchange.take() else {
            return;
        };

        let error = if error.trim().is_empty() {
            FALLBACK_ERROR_TEXT
        } else {
            error
        };
        self.mark_failed(&exchange.ai_message_id, error, exchange.request);
        self.accumulator.reset();
        self.mode = Mode::Errored(error.to_string());
    }

    /// Cancellation the view did not request itself, e.g. a provider stopping on
    /// its own. Settles the placeholder like a user cancel.
    pub fn on_cancelled(&mut self, stream_id: StreamId) {
        if !self.is_current(stream_id) {
            return;
        }

        if let Some(exchange) = self.exchange.take() {
            self.settle_placeholder(&exchange.ai_message_id);
        }
        self.accumulator.reset();
        self.mode = Mode::Idle;
    }

    fn is_current(&self, stream_id: StreamId) -> bool {
        let current = self.exchange.as_ref().is_some_and(|exchange| {
            exchange.session.stream_id == stream_id && exchange.session.chat_id == self.chat_id
        });

        if !current {
            debug!(stream_id, chat_id = %self.chat_id, "ignoring event from inactive stream");
        }
        current
    }

    fn abort_active(&mut self, host: &mut dyn HostOps) {
        if let Some(exchange) = self.exchange.take() {
            host.abort_stream(exchange.session.stream_id);
        }
        self.accumulator.reset();
        self.mode = Mode::Idle;
    }

    fn sync_placeholder(&mut self, streaming: bool) {
        let Some(message_id) = self.accumulator.message_id().map(ToString::to_string) else {
            return;
        };
        let text = self.accumulator.text().to_string();
        let citations = self.accumulator.citations().to_vec();

        if let Some(message) = self.message_mut(&message_id) {
            message.content = text;
            message.cited_sections = citations;
            message.is_streaming = streaming;
        }
    }

    fn settle_placeholder(&mut self, message_id: &str) {
        if let Some(message) = self.message_mut(message_id) {
            message.is_streaming = false;
        }
    }

    fn mark_failed(&mut self, message_id: &str, error: &str, request: RetryRequest) {
        if let Some(message) = self.message_mut(message_id) {
            message.content = error.to_string();
            message.is_error = true;
            message.is_streaming = false;
            message.retry = Some(request);
        }
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|message| message.id == id)
    }
}
