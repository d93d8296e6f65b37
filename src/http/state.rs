//! Server state.
//!
//! Holds the store, the access token and the workflow settings shared
//! by every request.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tokio::sync::Mutex;

use crate::log::{FailureLog, TracingFailureLog};
use crate::resource::StoreResource;
use crate::response::ApiResponse;
use crate::store::MemoryStore;
use crate::transaction::EarlyReturnPolicy;
use crate::workflow::UpdateWorkflow;

/// Shared state for the resource server.
///
/// Store transactions are connection-wide, so updates are serialized
/// through `write_lock`.
pub struct ServerState {
    store: MemoryStore,

    /// Optional authentication token. If set, requests must include this token.
    required_token: Option<String>,

    early_return: EarlyReturnPolicy,

    failure_log: Arc<dyn FailureLog>,

    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("store", &self.store)
            .field("early_return", &self.early_return)
            .field("auth", &self.required_token.is_some())
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Create state over a store, with no token and default settings.
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            required_token: None,
            early_return: EarlyReturnPolicy::default(),
            failure_log: Arc::new(TracingFailureLog),
            write_lock: Mutex::new(()),
        }
    }

    /// Create state wrapped in Arc for sharing.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Set the required authentication token.
    pub fn with_required_token(mut self, token: &str) -> Self {
        self.required_token = Some(token.to_string());
        self
    }

    pub fn with_early_return(mut self, policy: EarlyReturnPolicy) -> Self {
        self.early_return = policy;
        self
    }

    pub fn with_failure_log(mut self, log: Arc<dyn FailureLog>) -> Self {
        self.failure_log = log;
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Check the bearer token, if one is required.
    pub(crate) fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiResponse> {
        let Some(required) = &self.required_token else {
            return Ok(());
        };

        let provided = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        if provided == Some(required.as_str()) {
            Ok(())
        } else {
            tracing::debug!("rejected request with missing or wrong token");
            Err(ApiResponse::error(401, "Unauthenticated"))
        }
    }

    /// Build the workflow for one table.
    pub(crate) fn workflow(&self, table: &str) -> UpdateWorkflow<StoreResource> {
        StoreResource::new(self.store.clone(), table)
            .into_workflow()
            .with_early_return(self.early_return)
            .with_failure_log(self.failure_log.clone())
    }

    /// Serialize writers for the duration of one update.
    pub(crate) async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
