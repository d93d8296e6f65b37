//! Error types for resource update operations.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors that can occur in collaborators, the store, the client and
/// configuration.
///
/// The update workflow itself never returns these; it recovers every
/// failure into an [`UpdateOutcome`](crate::UpdateOutcome).
#[derive(Debug, Error)]
pub enum CrudError {
    /// Configuration is present but malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record not found.
    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    /// Payload failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// No table or route is registered under this name.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// Transaction bookkeeping failed (e.g. commit without begin).
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A workflow hook refused or could not complete its work.
    #[error("hook failed: {0}")]
    Hook(String),

    /// API request failed.
    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// Filesystem or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },
}

/// Result type alias for crudkit operations.
pub type Result<T> = core::result::Result<T, CrudError>;
