//! Deterministic mock implementation of the `answer_provider` contract.
//!
//! Replays a fixed script of steps with no network access. Used for local
//! development and for exercising the chat session without a backend.

use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use answer_provider::{AnswerProvider, AskRequest, CancelSignal, ProviderProfile, StreamEvent};
use serde_json::{json, Value};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// One scripted action replayed by [`MockProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockStep {
    /// Emitted word by word as content events.
    Content(String),
    Citations(Vec<Value>),
    /// Ends the stream with `Failed`; later steps are not replayed.
    Fail(String),
    Delay(Duration),
}

#[derive(Debug)]
pub struct MockProvider {
    steps: Vec<MockStep>,
    token_delay: Duration,
    requests: Mutex<Vec<AskRequest>>,
}

impl MockProvider {
    #[must_use]
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps,
            token_delay: Duration::from_millis(Self::TOKEN_DELAY_MS),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Overrides the pause between emitted words.
    #[must_use]
    pub fn with_token_delay(mut self, token_delay: Duration) -> Self {
        self.token_delay = token_delay;
        self
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<AskRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    fn pause(&self, duration: Duration, cancel: &CancelSignal) -> bool {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if cancel.load(Ordering::SeqCst) {
                return false;
            }
            let slice = remaining.min(Duration::from_millis(Self::CANCEL_POLL_MS));
            thread::sleep(slice);
            remaining -= slice;
        }
        !cancel.load(Ordering::SeqCst)
    }

    const TOKEN_DELAY_MS: u64 = 40;
    const CANCEL_POLL_MS: u64 = 10;
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(vec![
            MockStep::Delay(Duration::from_millis(150)),
            MockStep::Content("The standard warranty period is 2 years from the date of purchase. ".to_string()),
            MockStep::Content("Registering the product extends it by 12 months.".to_string()),
            MockStep::Citations(vec![
                json!({
                    "title": "Owner's Manual",
                    "section_title": "Warranty",
                    "preview": "...covered for 2 years from the date of purchase...",
                    "pages": [4],
                    "source_url": "https://docs.acaceta.example/manual.pdf",
                    "document_id": "manual-2024",
                    "score": 0.92
                }),
                Value::String(
                    json!({
                        "title": "Registration Terms",
                        "preview": "...an additional 12 months...",
                        "pages": [1, 2]
                    })
                    .to_string(),
                ),
            ]),
        ])
    }
}

impl AnswerProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            endpoint: "mock://ask_stream".to_string(),
        }
    }

    fn run(
        &self,
        req: AskRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), String> {
        let stream_id = req.stream_id;
        lock_unpoisoned(&self.requests).push(req);

        emit(StreamEvent::Started { stream_id });

        for step in &self.steps {
            if cancel.load(Ordering::SeqCst) {
                emit(StreamEvent::Cancelled { stream_id });
                return Ok(());
            }

            match step {
                MockStep::Delay(duration) => {
                    if !self.pause(*duration, &cancel) {
                        emit(StreamEvent::Cancelled { stream_id });
                        return Ok(());
                    }
                }
                MockStep::Content(text) => {
                    let mut pending_token = String::new();
                    for ch in text.chars() {
                        pending_token.push(ch);
                        if matches!(ch, ' ' | '\n') {
                            emit(StreamEvent::Content {
                                stream_id,
                                text: std::mem::take(&mut pending_token),
                            });
                            if !self.pause(self.token_delay, &cancel) {
                                emit(StreamEvent::Cancelled { stream_id });
                                return Ok(());
                            }
                        }
                    }

                    if !pending_token.is_empty() {
                        emit(StreamEvent::Content {
                            stream_id,
                            text: pending_token,
                        });
                    }
                }
                MockStep::Citations(entries) => emit(StreamEvent::Citations {
                    stream_id,
                    entries: entries.clone(),
                }),
                MockStep::Fail(error) => {
                    emit(StreamEvent::Failed {
                        stream_id,
                        error: error.clone(),
                    });
                    return Ok(());
                }
            }
        }

        if cancel.load(Ordering::SeqCst) {
            emit(StreamEvent::Cancelled { stream_id });
        } else {
            emit(StreamEvent::Finished { stream_id });
        }

        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
