//! Tracing subscriber setup for the command-line host.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "ACACETA_LOG";
pub const DEFAULT_LOG_FILTER: &str =
    "acaceta=info,ask_stream_api=info,chat_session=info,answer_provider_ask_stream=info";

/// Installs the global subscriber. Logs go to stderr so stdout carries only answers.
pub fn init_logging(directives: Option<&str>) -> Result<()> {
    let filter = build_filter(directives)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}

fn build_filter(directives: Option<&str>) -> Result<EnvFilter> {
    let directives = directives
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER);

    EnvFilter::try_new(directives)
        .map_err(|error| anyhow!("invalid {LOG_ENV} directives '{directives}': {error}"))
}
