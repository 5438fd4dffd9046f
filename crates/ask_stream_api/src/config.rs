use std::collections::BTreeMap;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::url::DEFAULT_API_BASE_URL;

/// Default bound on connecting and on silence between body chunks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport configuration for answer stream requests.
#[derive(Debug, Clone)]
pub struct AskStreamConfig {
    /// Bearer token passed to `Authorization`.
    pub access_token: String,
    /// Base URL of the chat backend.
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Connect budget across retries, and inactivity bound while reading the body.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AskStreamConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl AskStreamConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
