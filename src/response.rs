//! JSON response values.
//!
//! [`ApiResponse`] is a status code and a JSON body, independent of any
//! HTTP framework. The server converts it into an axum response; the
//! client parses the same shapes back.

use serde::Serialize;
use serde_json::{json, Value};

use crate::validation::ValidationErrors;

/// Status + JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// `200 {"status": "ok", "data": ...}`
    pub fn ok<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self::new(200, json!({ "status": "ok", "data": data })),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response data");
                Self::error(500, "Failed to serialize response")
            }
        }
    }

    /// `{"status": "error", "message": ...}` with the given status.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            status,
            json!({ "status": "error", "message": message.into() }),
        )
    }

    /// 422 with per-field messages under `errors`.
    pub fn validation_failed(errors: &ValidationErrors) -> Self {
        Self::new(
            422,
            json!({
                "status": "error",
                "message": "Validation failed",
                "errors": errors,
            }),
        )
    }

    /// 409 for unique values already held by another record.
    pub fn conflict(errors: &ValidationErrors) -> Self {
        Self::new(
            409,
            json!({
                "status": "error",
                "message": errors.to_string(),
                "errors": errors,
            }),
        )
    }

    /// 404 naming the resource, e.g. "User not found".
    pub fn not_found(resource: &str) -> Self {
        Self::error(404, format!("{resource} not found"))
    }

    /// 500 for an update that was rolled back.
    pub fn update_failed() -> Self {
        Self::error(500, "Update failed")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `message` field of an error body.
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

/// "users" -> "User", "blog_posts" -> "Blog post".
pub(crate) fn display_name(resource: &str) -> String {
    let singular = resource.strip_suffix('s').unwrap_or(resource);
    let words = singular.replace(['_', '-'], " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
