//! Environment-driven configuration.
//!
//! | Variable | Used by | Default |
//! |---|---|---|
//! | `CRUDKIT_ADDR` | server | `127.0.0.1:8080` |
//! | `CRUDKIT_DATA` | server | none (empty store) |
//! | `CRUDKIT_EARLY_RETURN` | server | `rollback` |
//! | `CRUDKIT_API_TOKEN` | server, client | none |
//! | `CRUDKIT_API_URL` | client | `http://127.0.0.1:8080` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{CrudError, Result};
use crate::transaction::EarlyReturnPolicy;

pub const ENV_ADDR: &str = "CRUDKIT_ADDR";
pub const ENV_DATA: &str = "CRUDKIT_DATA";
pub const ENV_EARLY_RETURN: &str = "CRUDKIT_EARLY_RETURN";
pub const ENV_API_TOKEN: &str = "CRUDKIT_API_TOKEN";
pub const ENV_API_URL: &str = "CRUDKIT_API_URL";

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Settings for the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: SocketAddr,
    /// Seed document to load at startup.
    pub data: Option<PathBuf>,
    /// Bearer token every request must carry, if set.
    pub token: Option<String>,
    /// Transaction handling when a hook short-circuits.
    pub early_return: EarlyReturnPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data: None,
            token: None,
            early_return: EarlyReturnPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidConfig`] if a variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup(ENV_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr.parse::<SocketAddr>().map_err(|_| {
            CrudError::InvalidConfig(format!("{ENV_ADDR}: '{addr}' is not a socket address"))
        })?;

        let early_return = match lookup(ENV_EARLY_RETURN) {
            Some(raw) => raw.parse()?,
            None => EarlyReturnPolicy::default(),
        };

        Ok(Self {
            addr,
            data: lookup(ENV_DATA).filter(|s| !s.is_empty()).map(PathBuf::from),
            token: lookup(ENV_API_TOKEN).filter(|s| !s.is_empty()),
            early_return,
        })
    }
}
