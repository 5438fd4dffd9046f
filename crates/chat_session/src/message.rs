use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::citations::CitedSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

/// Everything needed to send the same question again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryRequest {
    pub query: String,
    #[serde(default)]
    pub indices: Vec<String>,
    #[serde(default = "empty_filters")]
    pub filter_dimensions: Value,
}

impl RetryRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, indices: Vec<String>, filter_dimensions: Value) -> Self {
        Self {
            query: query.into(),
            indices,
            filter_dimensions: if filter_dimensions.is_null() {
                empty_filters()
            } else {
                filter_dimensions
            },
        }
    }
}

fn empty_filters() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    #[serde(default)]
    pub cited_sections: Vec<CitedSection>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub is_error: bool,
    /// Present only on failed AI messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryRequest>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: Sender::User,
            content: content.into(),
            cited_sections: Vec::new(),
            is_streaming: false,
            is_error: false,
            retry: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Empty AI message shown while the answer is on its way.
    #[must_use]
    pub fn ai_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: Sender::Ai,
            content: String::new(),
            cited_sections: Vec::new(),
            is_streaming: true,
            is_error: false,
            retry: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn is_ai(&self) -> bool {
        self.sender == Sender::Ai
    }

    /// Whether this message offers a retry of its original question.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.is_error && self.retry.is_some()
    }
}
