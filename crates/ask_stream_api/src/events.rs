use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded frame of the answer stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AskStreamEvent {
    /// Incremental answer text.
    Content {
        #[serde(default)]
        text: String,
    },
    /// Full citation set for the answer so far. Entries are raw: either objects
    /// or JSON-encoded strings, validated by the consumer.
    Citations {
        #[serde(default)]
        cited_sections: Vec<Value>,
    },
    /// Terminal failure reported by the server.
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Terminal success marker.
    Done,
}

impl AskStreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::Citations { .. } => "citations",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }
}
