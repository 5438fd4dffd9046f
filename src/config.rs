//! Environment configuration and its merge with command-line arguments.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::ValueEnum;

use crate::cli::GlobalArgs;

pub const API_URL_ENV: &str = "ACACETA_API_URL";
pub const TOKEN_FILE_ENV: &str = "ACACETA_TOKEN_FILE";
pub const PROVIDER_ENV: &str = "ACACETA_PROVIDER";
pub const TIMEOUT_ENV: &str = "ACACETA_TIMEOUT_SEC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Stream answers from the `/ask_stream` endpoint.
    AskStream,
    /// Replay a canned answer without network access.
    Mock,
}

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub api_url: Option<String>,
    pub token_file: Option<PathBuf>,
    pub provider: Option<String>,
    pub timeout_sec: Option<u64>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env_string_opt(API_URL_ENV),
            token_file: env_string_opt(TOKEN_FILE_ENV).map(PathBuf::from),
            provider: env_string_opt(PROVIDER_ENV),
            timeout_sec: env_u64_opt(TIMEOUT_ENV),
        }
    }
}

/// Effective settings: command-line values win over the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: Option<String>,
    pub token_file: Option<PathBuf>,
    pub provider: ProviderKind,
    pub timeout: Option<Duration>,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs, env: &EnvConfig) -> Result<Self> {
        let provider = match (args.provider, env.provider.as_deref()) {
            (Some(provider), _) => provider,
            (None, Some(raw)) => match ProviderKind::from_str(raw.trim(), true) {
                Ok(provider) => provider,
                Err(_) => bail!(
                    "unsupported {PROVIDER_ENV} value '{raw}' (expected ask-stream or mock)"
                ),
            },
            (None, None) => ProviderKind::AskStream,
        };

        let timeout_sec = args.timeout_sec.or(env.timeout_sec);
        if timeout_sec == Some(0) {
            bail!("timeout must be greater than zero seconds");
        }

        Ok(Self {
            api_url: args.api_url.clone().or_else(|| env.api_url.clone()),
            token_file: args.token_file.clone().or_else(|| env.token_file.clone()),
            provider,
            timeout: timeout_sec.map(Duration::from_secs),
        })
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_u64_opt(key: &str) -> Option<u64> {
    env_string_opt(key).and_then(|value| value.trim().parse().ok())
}
