use std::io::{self, Write};
use std::process::ExitCode;

use acaceta::cli::{parse_filters, Cli, Command, ScopeArgs, TokenCommand};
use acaceta::config::{EnvConfig, Settings};
use acaceta::logging::init_logging;
use acaceta::provider::{build_provider, open_token_store};
use acaceta::session::{new_chat_id, run_ask, run_repl, AskScope};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.global.log.as_deref())?;
    let settings = Settings::resolve(&cli.global, &EnvConfig::from_env())?;

    match cli.command {
        Command::Ask(args) => {
            let provider = build_provider(&settings)?;
            let chat_id = args.scope.chat_id.clone().unwrap_or_else(new_chat_id);
            let scope = ask_scope(&args.scope)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();

            let message = if args.json {
                let message = run_ask(provider, &chat_id, &args.query, &scope, &mut io::sink())?;
                let json = serde_json::to_string_pretty(&message)
                    .context("failed to encode answer as JSON")?;
                writeln!(out, "{json}")?;
                message
            } else {
                run_ask(provider, &chat_id, &args.query, &scope, &mut out)?
            };

            Ok(if message.is_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Repl(args) => {
            let provider = build_provider(&settings)?;
            let chat_id = args.chat_id.clone().unwrap_or_else(new_chat_id);
            let scope = ask_scope(&args)?;
            let stdin = io::BufReader::new(io::stdin());
            let stdout = io::stdout();
            run_repl(provider, &chat_id, &scope, stdin, &mut stdout.lock())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Token(command) => {
            let mut store = open_token_store(&settings)?;
            match command {
                TokenCommand::Set {
                    token,
                    refresh_token,
                    guest,
                } => {
                    if guest {
                        store.set_guest_token(token)?;
                    } else {
                        store.set_tokens(token, refresh_token)?;
                    }
                    println!("Saved token to {}", store.path().display());
                }
                TokenCommand::Status => {
                    let path = store.path().display();
                    let signed_in = store.record().token.as_deref().map(str::trim);
                    match store.bearer_token() {
                        Some(token) if Some(token) == signed_in => {
                            println!("Using signed-in token from {path}")
                        }
                        Some(_) => println!("Using guest token from {path}"),
                        None => println!("No usable token in {path}"),
                    }
                }
                TokenCommand::Clear => {
                    store.clear()?;
                    println!("Removed stored tokens");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn ask_scope(args: &ScopeArgs) -> Result<AskScope> {
    Ok(AskScope {
        indices: args.indices.clone(),
        filter_dimensions: parse_filters(&args.filters)?,
    })
}
