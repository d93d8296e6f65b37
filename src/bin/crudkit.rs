//! crudkit CLI binary.
//!
//! Runs the resource server or talks to one.

use clap::Parser;
use crudkit::cli::{build_payload, Cli, Command};
use crudkit::http::ResourceServer;
use crudkit::output::record_table;
use crudkit::{ResourceClient, ResourceId, ServerConfig};
use serde_json::Value;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> crudkit::Result<()> {
    match cli.command {
        Command::Serve {
            addr,
            data,
            early_return,
        } => {
            let config = ServerConfig {
                addr,
                data,
                token: cli.token,
                early_return,
            };
            ResourceServer::run(config).await
        }
        Command::Get { resource, id } => {
            let client = ResourceClient::new(cli.token.as_deref(), &cli.url)?;
            let record = client.get(&resource, &ResourceId::parse(&id)).await?;
            output_record(&record, cli.json)
        }
        Command::Update {
            resource,
            id,
            set,
            body,
        } => {
            let payload = build_payload(body.as_deref(), &set)?;
            if payload.is_empty() {
                eprintln!("Hint: pass fields with --set FIELD=VALUE or --body '{{...}}'");
            }
            let client = ResourceClient::new(cli.token.as_deref(), &cli.url)?;
            let record = client
                .update(&resource, &ResourceId::parse(&id), &payload)
                .await
                .inspect_err(|e| {
                    if let crudkit::CrudError::Validation(errors) = e {
                        for field in errors.fields() {
                            for message in errors.get(field).unwrap_or_default() {
                                eprintln!("  {field}: {message}");
                            }
                        }
                    }
                })?;
            output_record(&record, cli.json)
        }
    }
}

fn output_record(record: &Value, json: bool) -> crudkit::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        println!("{}", record_table(record));
    }
    Ok(())
}
