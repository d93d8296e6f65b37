//! CLI argument parsing tests.

use clap::Parser;
use crudkit::cli::{Cli, Command};
use crudkit::EarlyReturnPolicy;

#[test]
fn test_cli_parses_update_subcommand() {
    let cli = Cli::parse_from([
        "crudkit",
        "update",
        "users",
        "42",
        "--set",
        "name=Bob",
        "--set",
        "age=30",
    ]);

    assert!(!cli.json);
    match cli.command {
        Command::Update {
            resource,
            id,
            set,
            body,
        } => {
            assert_eq!(resource, "users");
            assert_eq!(id, "42");
            assert_eq!(set, vec!["name=Bob".to_string(), "age=30".to_string()]);
            assert!(body.is_none());
        }
        _ => panic!("Expected Update command"),
    }
}

#[test]
fn test_cli_parses_update_with_body() {
    let cli = Cli::parse_from([
        "crudkit",
        "--json",
        "update",
        "users",
        "42",
        "--body",
        r#"{"name":"Bob"}"#,
    ]);

    assert!(cli.json);
    match cli.command {
        Command::Update { body, set, .. } => {
            assert_eq!(body.as_deref(), Some(r#"{"name":"Bob"}"#));
            assert!(set.is_empty());
        }
        _ => panic!("Expected Update command"),
    }
}

#[test]
fn test_cli_parses_get_subcommand() {
    let cli = Cli::parse_from(["crudkit", "get", "posts", "intro", "--url", "http://example.test"]);

    assert_eq!(cli.url, "http://example.test");
    match cli.command {
        Command::Get { resource, id } => {
            assert_eq!(resource, "posts");
            assert_eq!(id, "intro");
        }
        _ => panic!("Expected Get command"),
    }
}

#[test]
fn test_cli_parses_serve_subcommand() {
    let cli = Cli::parse_from([
        "crudkit",
        "serve",
        "--addr",
        "0.0.0.0:9000",
        "--data",
        "seed.json",
        "--early-return",
        "leave-open",
    ]);

    match cli.command {
        Command::Serve {
            addr,
            data,
            early_return,
        } => {
            assert_eq!(addr.port(), 9000);
            assert_eq!(data.unwrap().to_str(), Some("seed.json"));
            assert_eq!(early_return, EarlyReturnPolicy::LeaveOpen);
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_cli_rejects_unknown_policy() {
    let result = Cli::try_parse_from(["crudkit", "serve", "--early-return", "sometimes"]);
    assert!(result.is_err());
}

#[test]
fn test_cli_requires_subcommand() {
    let result = Cli::try_parse_from(["crudkit"]);
    assert!(result.is_err());
}
