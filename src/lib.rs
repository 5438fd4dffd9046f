//! Terminal client for Acaceta's streamed, citation-backed answers.
//!
//! The binary wires configuration, logging and provider selection around the
//! [`chat_session`] view and prints answers as they stream.

pub mod cli;
pub mod config;
pub mod logging;
pub mod printer;
pub mod provider;
pub mod session;

pub use cli::{parse_filters, Cli, Command, GlobalArgs, ScopeArgs, TokenCommand};
pub use config::{EnvConfig, ProviderKind, Settings};
pub use printer::AnswerPrinter;
pub use session::{new_chat_id, run_ask, run_repl, AskScope};
