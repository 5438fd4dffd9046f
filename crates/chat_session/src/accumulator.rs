use crate::citations::CitedSection;

/// Running state of the answer currently being streamed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StreamAccumulator {
    message_id: Option<String>,
    text: String,
    citations: Vec<CitedSection>,
}

impl StreamAccumulator {
    /// Start accumulating for `message_id`, discarding any previous state.
    pub fn begin(&mut self, message_id: impl Into<String>) {
        self.reset();
        self.message_id = Some(message_id.into());
    }

    pub fn push_content(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    /// Citations are replaced wholesale, never merged.
    pub fn replace_citations(&mut self, citations: Vec<CitedSection>) {
        self.citations = citations;
    }

    pub fn reset(&mut self) {
        self.message_id = None;
        self.text.clear();
        self.citations.clear();
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn citations(&self) -> &[CitedSection] {
        &self.citations
    }

    pub fn is_empty(&self) -> bool {
        self.message_id.is_none() && self.text.is_empty() && self.citations.is_empty()
    }
}
