use std::collections::BTreeMap;

use crate::config::AskStreamConfig;
use crate::error::AskStreamError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "user-agent";

const DEFAULT_USER_AGENT: &str = concat!("acaceta/", env!("CARGO_PKG_VERSION"));

/// Build a deterministic header map for answer stream requests.
pub fn build_headers(config: &AskStreamConfig) -> Result<BTreeMap<String, String>, AskStreamError> {
    let token = config.access_token.trim();
    if token.is_empty() {
        return Err(AskStreamError::MissingAccessToken);
    }

    let mut headers = BTreeMap::new();
    headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {token}"));
    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    let ua = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER_AGENT);
    headers.insert(HEADER_USER_AGENT.to_owned(), ua.to_owned());

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}
