use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AskStreamError {
    #[error("access token is required")]
    MissingAccessToken,

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("retry exhausted after {attempts} attempts (status: {}, last_error: {last_error:?})", display_status(.status))]
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
        attempts: u32,
    },

    #[error("no response within {}s", display_secs(.0))]
    Timeout(Duration),

    #[error("stream failed: {message}")]
    StreamFailed { message: String },

    #[error("request was cancelled")]
    Cancelled,

    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl AskStreamError {
    /// True for failures the retry loop treats as transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Message suitable for showing in place of the failed answer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout(_) => "The answer took too long to arrive. Please try again.".to_owned(),
            Self::StreamFailed { message } => message.clone(),
            Self::MissingAccessToken => "You are not signed in.".to_owned(),
            Self::RetryExhausted { .. } | Self::Request(_) => {
                "Could not reach the server. Please try again.".to_owned()
            }
            other => other.to_string(),
        }
    }
}

fn display_secs(duration: &Duration) -> u64 {
    duration.as_secs()
}

fn display_status(status: &Option<StatusCode>) -> String {
    status
        .map(|status| status.as_u16().to_string())
        .unwrap_or_else(|| "n/a".to_owned())
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Extract a readable message from an error response body.
///
/// Accepts `{"detail": ..}`, `{"message": ..}` and `{"error": ..|{"message": ..}}`
/// shapes; anything else falls back to the raw body or the canonical reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.trim().to_string()
        }
    };

    let Ok(parsed) = serde_json::from_str::<ErrorPayload>(body) else {
        return fallback();
    };

    let from_value = |value: &serde_json::Value| -> Option<String> {
        match value {
            serde_json::Value::String(text) => non_empty(text),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|message| message.as_str())
                .and_then(non_empty),
            _ => None,
        }
    };

    parsed
        .detail
        .as_ref()
        .and_then(from_value)
        .or_else(|| parsed.message.as_deref().and_then(non_empty))
        .or_else(|| parsed.error.as_ref().and_then(from_value))
        .unwrap_or_else(fallback)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
