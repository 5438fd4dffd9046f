//! Command-line definitions.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

use crate::config::ProviderKind;
use crate::logging::LOG_ENV;

/// Ask questions about your documents and stream cited answers.
#[derive(Parser, Debug)]
#[command(name = "acaceta-chat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Base URL of the Acaceta API
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Token file (defaults to ~/.acaceta/tokens.json)
    #[arg(long, global = true, value_name = "FILE")]
    pub token_file: Option<PathBuf>,

    /// Answer provider
    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Connect and inactivity timeout in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout_sec: Option<u64>,

    /// Log filter directives
    #[arg(long, global = true, env = LOG_ENV, value_name = "DIRECTIVES")]
    pub log: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask one question and stream the answer to stdout
    Ask(AskArgs),
    /// Interactive chat; type /help for commands
    Repl(ScopeArgs),
    /// Manage stored auth tokens
    #[command(subcommand)]
    Token(TokenCommand),
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    /// The question
    pub query: String,

    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Print the final message as JSON instead of streaming text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Chat to ask in (a new one is created when omitted)
    #[arg(long, value_name = "ID")]
    pub chat_id: Option<String>,

    /// Restrict the search to an index (repeatable)
    #[arg(long = "index", value_name = "NAME")]
    pub indices: Vec<String>,

    /// Metadata filter as key=value (repeatable)
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TokenCommand {
    /// Store a token
    Set {
        token: String,
        #[arg(long)]
        refresh_token: Option<String>,
        /// Store as the guest token instead
        #[arg(long, conflicts_with = "refresh_token")]
        guest: bool,
    },
    /// Show which stored token would be used
    Status,
    /// Remove all stored tokens
    Clear,
}

/// Folds `key=value` pairs into `{"key": ["value", ..]}`.
pub fn parse_filters(filters: &[String]) -> Result<Value> {
    let mut dimensions = Map::new();

    for filter in filters {
        let Some((key, value)) = filter.split_once('=') else {
            bail!("filter '{filter}' must look like key=value");
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            bail!("filter '{filter}' must have a non-empty key and value");
        }

        let entry = dimensions
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = entry {
            values.push(Value::String(value.to_string()));
        }
    }

    Ok(Value::Object(dimensions))
}
