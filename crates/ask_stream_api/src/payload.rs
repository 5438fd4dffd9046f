use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for the streaming answer endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskStreamRequest {
    pub query: String,
    pub chat_id: String,
    #[serde(default)]
    pub indices: Vec<String>,
    /// Metadata filter selection; `{}` when no filter is applied.
    #[serde(default = "empty_object")]
    pub filter_dimensions: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl AskStreamRequest {
    pub fn new(query: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            chat_id: chat_id.into(),
            indices: Vec::new(),
            filter_dimensions: empty_object(),
        }
    }

    pub fn with_indices(mut self, indices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.indices = indices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter_dimensions(mut self, filter_dimensions: Value) -> Self {
        self.filter_dimensions = if filter_dimensions.is_null() {
            empty_object()
        } else {
            filter_dimensions
        };
        self
    }
}
