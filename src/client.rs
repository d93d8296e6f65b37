//! Resource API client.
//!
//! Low-level HTTP client for a crudkit server: authentication, raw
//! requests, and mapping error responses back onto [`CrudError`].

use std::env;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::{DEFAULT_API_URL, ENV_API_TOKEN, ENV_API_URL};
use crate::error::{CrudError, Result};
use crate::payload::{Payload, ResourceId};
use crate::validation::ValidationErrors;

const USER_AGENT: &str = concat!("crudkit/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the resource endpoint.
///
/// This struct is cheaply cloneable; clones reference the same underlying
/// connection pool.
///
/// # Example
///
/// ```no_run
/// use crudkit::{Payload, ResourceClient, ResourceId};
///
/// # async fn example() -> crudkit::Result<()> {
/// let client = ResourceClient::new(None, "http://127.0.0.1:8080")?;
/// let user = client
///     .update("users", &ResourceId::Int(42), &Payload::new().with("name", "Bob"))
///     .await?;
/// println!("{user}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResourceClient {
    http: Client,
    base_url: Arc<Url>,
    token: Option<String>,
}

impl std::fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ResourceClient {
    /// Create a client from environment variables.
    ///
    /// Uses `CRUDKIT_API_URL` for the base URL (defaults to
    /// `http://127.0.0.1:8080`) and optionally `CRUDKIT_API_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn from_env() -> Result<Self> {
        let token = env::var(ENV_API_TOKEN).ok().filter(|t| !t.is_empty());
        let base_url = env::var(ENV_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        Self::new(token.as_deref(), &base_url)
    }

    /// Create a new client with an optional bearer token and base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(token: Option<&str>, base_url: &str) -> Result<Self> {
        // Ensure base URL ends with /
        let base_url_str = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        let base_url = Url::parse(&base_url_str)?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CrudError::HttpError)?;

        Ok(Self {
            http,
            base_url: Arc::new(base_url),
            token: token.map(str::to_string),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch a record, returning the `data` of the response.
    ///
    /// # Errors
    ///
    /// [`CrudError::NotFound`] for a missing record, or any transport or
    /// API error.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, resource: &str, id: &ResourceId) -> Result<Value> {
        let path = resource_path(resource, id);
        let request = self.http.get(self.base_url.join(&path)?);

        let response = self.send(request, resource, id).await?;
        Self::into_data(response).await
    }

    /// Update a record, returning the `data` of the response.
    ///
    /// # Errors
    ///
    /// [`CrudError::Validation`] when the server rejects the payload,
    /// [`CrudError::NotFound`] for a missing record, or any transport or
    /// API error.
    #[tracing::instrument(skip(self, payload))]
    pub async fn update(&self, resource: &str, id: &ResourceId, payload: &Payload) -> Result<Value> {
        self.put(resource, id, payload).await
    }

    /// PUT an arbitrary JSON body to a record.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        resource: &str,
        id: &ResourceId,
        body: &B,
    ) -> Result<Value> {
        let path = resource_path(resource, id);
        let request = self.http.put(self.base_url.join(&path)?).json(body);

        let response = self.send(request, resource, id).await?;
        Self::into_data(response).await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        resource: &str,
        id: &ResourceId,
    ) -> Result<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(CrudError::HttpError)?;
        Self::check_response(response, resource, id).await
    }

    async fn into_data(response: Response) -> Result<Value> {
        let mut body: Value = response.json().await.map_err(CrudError::HttpError)?;
        match body.get_mut("data") {
            Some(data) => Ok(data.take()),
            None => Ok(body),
        }
    }

    /// Check response status and convert errors.
    async fn check_response(response: Response, resource: &str, id: &ResourceId) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::NOT_FOUND => {
                return Err(CrudError::NotFound {
                    resource: resource.to_string(),
                    id: id.to_string(),
                });
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(CrudError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }
            _ => {}
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(_) => {
                return Err(CrudError::ApiError {
                    message: format!("HTTP {status}"),
                    status_code: Some(status.as_u16()),
                })
            }
        };

        let json = serde_json::from_str::<Value>(&body).ok();

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Some(errors) = json
                .as_ref()
                .and_then(|j| j.get("errors"))
                .and_then(|e| serde_json::from_value::<ValidationErrors>(e.clone()).ok())
            {
                return Err(CrudError::Validation(errors));
            }
        }

        Err(CrudError::ApiError {
            message: Self::extract_error_message(json.as_ref(), body),
            status_code: Some(status.as_u16()),
        })
    }

    /// Extract error message from a failed response body.
    fn extract_error_message(json: Option<&Value>, body: String) -> String {
        if let Some(json) = json {
            if let Some(msg) = json.get("message").and_then(|m| m.as_str()) {
                return msg.to_string();
            }
            if let Some(err) = json.get("error").and_then(|m| m.as_str()) {
                return err.to_string();
            }
        }

        body
    }
}

fn resource_path(resource: &str, id: &ResourceId) -> String {
    format!(
        "{}/{}",
        urlencoding::encode(resource),
        urlencoding::encode(&id.to_string())
    )
}
