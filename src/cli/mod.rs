//! CLI argument parsing types.
//!
//! This module provides the command-line interface structure for the crudkit binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::config::{
    DEFAULT_ADDR, DEFAULT_API_URL, ENV_ADDR, ENV_API_TOKEN, ENV_API_URL, ENV_DATA,
    ENV_EARLY_RETURN,
};
use crate::error::{CrudError, Result};
use crate::payload::Payload;
use crate::transaction::EarlyReturnPolicy;

/// Resource update command-line interface.
#[derive(Parser, Debug)]
#[command(name = "crudkit", about = "Transactional resource updates over HTTP", version)]
pub struct Cli {
    /// Output results as JSON instead of a table.
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Base URL of the resource server.
    #[arg(long, global = true, env = ENV_API_URL, default_value = DEFAULT_API_URL)]
    pub url: String,

    /// Bearer token for the resource server.
    #[arg(long, global = true, env = ENV_API_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the resource server.
    Serve {
        /// Address to listen on.
        #[arg(long, env = ENV_ADDR, default_value = DEFAULT_ADDR)]
        addr: SocketAddr,

        /// Seed document with table definitions and records.
        #[arg(long, env = ENV_DATA)]
        data: Option<PathBuf>,

        /// What to do with the transaction when a hook answers early
        /// (rollback, commit, leave-open).
        #[arg(long, env = ENV_EARLY_RETURN, default_value = "rollback")]
        early_return: EarlyReturnPolicy,
    },

    /// Fetch a single record.
    Get {
        /// The resource (table) name.
        resource: String,

        /// The record identifier.
        id: String,
    },

    /// Update a record.
    Update {
        /// The resource (table) name.
        resource: String,

        /// The record identifier.
        id: String,

        /// Field assignment as `field=value`; values are parsed as JSON
        /// when possible. Repeatable.
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Full JSON object payload. `--set` values are applied on top.
        #[arg(long)]
        body: Option<String>,
    },
}

/// Build an update payload from `--body` and `--set` arguments.
///
/// # Errors
///
/// Returns [`CrudError::InvalidConfig`] for a malformed assignment and a
/// parse error for an invalid body.
pub fn build_payload(body: Option<&str>, set: &[String]) -> Result<Payload> {
    let mut payload = match body {
        Some(raw) => Payload::from_value(serde_json::from_str(raw)?)?,
        None => Payload::new(),
    };

    for assignment in set {
        let (field, raw) = assignment.split_once('=').ok_or_else(|| {
            CrudError::InvalidConfig(format!("expected FIELD=VALUE, got '{assignment}'"))
        })?;
        if field.is_empty() {
            return Err(CrudError::InvalidConfig(format!(
                "empty field name in '{assignment}'"
            )));
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::from(raw));
        payload.insert(field, value);
    }

    Ok(payload)
}
