use serde_json::Value;
use tracing::{debug, warn};

use crate::events::AskStreamEvent;

/// Incremental parser for the answer stream's SSE framing.
///
/// Bytes are buffered until a complete frame (terminated by a blank line) is
/// available, so chunk boundaries may fall anywhere, including inside a
/// multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    pending: Vec<u8>,
    skipped: usize,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<AskStreamEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some((end, delimiter_len)) = find_frame_end(&self.pending) {
            let frame: Vec<u8> = self.pending.drain(..end + delimiter_len).collect();
            if let Some(event) = self.decode_frame(&frame[..end]) {
                events.push(event);
            }
        }

        events
    }

    /// Decode whatever remains buffered once the byte stream has ended.
    pub fn finish(&mut self) -> Option<AskStreamEvent> {
        if self.is_empty_buffer() {
            self.pending.clear();
            return None;
        }

        let frame = std::mem::take(&mut self.pending);
        self.decode_frame(&frame)
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<AskStreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.pending.iter().all(u8::is_ascii_whitespace)
    }

    /// Count of frames dropped as malformed or unrecognized.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    fn decode_frame(&mut self, frame: &[u8]) -> Option<AskStreamEvent> {
        let frame = String::from_utf8_lossy(frame);
        let payload = extract_data_payload(&frame)?;
        if payload == "[DONE]" {
            return Some(AskStreamEvent::Done);
        }

        let value = match serde_json::from_str::<Value>(&payload) {
            Ok(value) => value,
            Err(error) => {
                self.skipped += 1;
                warn!(%error, frame = %truncate(&payload), "skipping malformed SSE frame");
                return None;
            }
        };

        let event = map_event(&value);
        if event.is_none() {
            self.skipped += 1;
            debug!(frame = %truncate(&payload), "skipping SSE frame with unknown type");
        }
        event
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|window| window == b"\n\n");
    let crlf = buffer.windows(4).position(|window| window == b"\r\n\r\n");

    match (lf, crlf) {
        (Some(lf), Some(crlf)) if crlf < lf => Some((crlf, 4)),
        (Some(lf), _) => Some((lf, 2)),
        (None, Some(crlf)) => Some((crlf, 4)),
        (None, None) => None,
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_event(value: &Value) -> Option<AskStreamEvent> {
    let event_type = value.get("type")?.as_str()?;

    match event_type {
        "content" => {
            let text = value
                .get("text")
                .and_then(|value| value.as_str())
                .unwrap_or("");
            Some(AskStreamEvent::Content {
                text: text.to_owned(),
            })
        }
        "citations" => {
            let cited_sections = value
                .get("cited_sections")
                .and_then(|value| value.as_array())
                .cloned()
                .unwrap_or_default();
            Some(AskStreamEvent::Citations { cited_sections })
        }
        "error" => {
            let message = value
                .get("message")
                .and_then(|value| value.as_str())
                .map(ToString::to_string);
            Some(AskStreamEvent::Error { message })
        }
        "done" => Some(AskStreamEvent::Done),
        _ => None,
    }
}

fn truncate(payload: &str) -> &str {
    const LIMIT: usize = 120;
    match payload.char_indices().nth(LIMIT) {
        Some((index, _)) => &payload[..index],
        None => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::SseStreamParser;
    use crate::events::AskStreamEvent;

    #[test]
    fn parse_sse_frames_incrementally() {
        let mut parser = SseStreamParser::default();
        let mut events = Vec::new();

        events.extend(parser.feed(b"data: {\"type\":\"content\",\"text\":\"Hello\"}\n\n"));
        assert_eq!(events.len(), 1);

        events.extend(parser.feed(b"data: {\"type\":\"done\"}\n\n"));
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], AskStreamEvent::Done);
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn multibyte_text_split_across_chunks_is_preserved() {
        let frame = "data: {\"type\":\"content\",\"text\":\"Garantie für 2 Jahre\"}\n\n";
        let bytes = frame.as_bytes();
        let split = frame.find('ü').expect("umlaut present") + 1;

        let mut parser = SseStreamParser::default();
        assert!(parser.feed(&bytes[..split]).is_empty());
        let events = parser.feed(&bytes[split..]);

        assert_eq!(
            events,
            vec![AskStreamEvent::Content {
                text: "Garantie für 2 Jahre".to_owned(),
            }]
        );
    }

    #[test]
    fn finish_flushes_trailing_frame_without_blank_line() {
        let mut parser = SseStreamParser::default();
        assert!(parser.feed(b"data: {\"type\":\"done\"}").is_empty());
        assert_eq!(parser.finish(), Some(AskStreamEvent::Done));
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn crlf_delimited_frames_are_split() {
        let events = SseStreamParser::parse_frames(
            "data: {\"type\":\"content\",\"text\":\"a\"}\r\n\r\ndata: {\"type\":\"done\"}\r\n\r\n",
        );
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn skipped_frames_are_counted() {
        let mut parser = SseStreamParser::default();
        parser.feed(b"data: {oops\n\ndata: {\"type\":\"mystery\"}\n\n");
        assert_eq!(parser.skipped_frames(), 2);
    }
}
