/// Default base URL for a locally running chat backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

const ASK_STREAM_PATH: &str = "/ask_stream";

/// Normalize a base URL to the streaming answer endpoint.
///
/// Normalization rules:
/// 1) keep `/ask_stream` unchanged
/// 2) append `/ask_stream` otherwise
pub fn normalize_ask_stream_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_API_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(ASK_STREAM_PATH) {
        return trimmed.to_string();
    }
    format!("{trimmed}{ASK_STREAM_PATH}")
}
