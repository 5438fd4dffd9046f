use std::path::PathBuf;

use acaceta::{Cli, Command, ProviderKind, TokenCommand};
use clap::Parser;

#[test]
fn ask_collects_scope_and_global_flags() {
    let cli = Cli::try_parse_from([
        "acaceta-chat",
        "ask",
        "What is the warranty period?",
        "--index",
        "manuals",
        "--index",
        "terms",
        "--filter",
        "brand=Acme",
        "--chat-id",
        "c1",
        "--json",
        "--provider",
        "mock",
        "--timeout-sec",
        "5",
        "--token-file",
        "/tmp/tokens.json",
    ])
    .expect("ask arguments should parse");

    assert_eq!(cli.global.provider, Some(ProviderKind::Mock));
    assert_eq!(cli.global.timeout_sec, Some(5));
    assert_eq!(cli.global.token_file, Some(PathBuf::from("/tmp/tokens.json")));

    let Command::Ask(args) = cli.command else {
        panic!("expected ask subcommand");
    };
    assert_eq!(args.query, "What is the warranty period?");
    assert_eq!(args.scope.chat_id.as_deref(), Some("c1"));
    assert_eq!(args.scope.indices, vec!["manuals", "terms"]);
    assert_eq!(args.scope.filters, vec!["brand=Acme"]);
    assert!(args.json);
}

#[test]
fn provider_names_are_kebab_case() {
    let cli = Cli::try_parse_from(["acaceta-chat", "--provider", "ask-stream", "repl"])
        .expect("repl arguments should parse");
    assert_eq!(cli.global.provider, Some(ProviderKind::AskStream));

    assert!(Cli::try_parse_from(["acaceta-chat", "--provider", "openai", "repl"]).is_err());
}

#[test]
fn ask_requires_a_query() {
    assert!(Cli::try_parse_from(["acaceta-chat", "ask"]).is_err());
}

#[test]
fn token_set_accepts_refresh_or_guest_but_not_both() {
    let cli = Cli::try_parse_from([
        "acaceta-chat",
        "token",
        "set",
        "abc",
        "--refresh-token",
        "def",
    ])
    .expect("token set should parse");
    let Command::Token(TokenCommand::Set {
        token,
        refresh_token,
        guest,
    }) = cli.command
    else {
        panic!("expected token set");
    };
    assert_eq!(token, "abc");
    assert_eq!(refresh_token.as_deref(), Some("def"));
    assert!(!guest);

    assert!(Cli::try_parse_from([
        "acaceta-chat",
        "token",
        "set",
        "abc",
        "--refresh-token",
        "def",
        "--guest",
    ])
    .is_err());
}
