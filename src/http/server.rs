//! Resource server.
//!
//! Provides an axum-based HTTP server around the update workflow.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::handlers;
use super::state::ServerState;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::store::MemoryStore;

/// A running resource server.
///
/// The server runs in a background task; use [`ResourceServer::run`] to
/// serve in the foreground until Ctrl-C.
pub struct ResourceServer {
    /// The URL where the server is listening.
    url: String,
    /// Handle to the server task.
    handle: JoinHandle<()>,
    /// Shared state that can be inspected during tests.
    state: Arc<ServerState>,
}

impl ResourceServer {
    /// Start a server over a store on a random local port.
    ///
    /// # Errors
    ///
    /// Returns an error if no port could be bound.
    pub async fn start(store: MemoryStore) -> Result<Self> {
        Self::with_state(ServerState::new(store)).await
    }

    /// Start a server with custom state on a random local port.
    pub async fn with_state(state: ServerState) -> Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0)), state).await
    }

    /// Start a server with custom state on the given address.
    pub async fn bind(addr: SocketAddr, state: ServerState) -> Result<Self> {
        let shared_state = state.shared();
        let app = Self::router(shared_state.clone());

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "server stopped");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            handle,
            state: shared_state,
        })
    }

    /// Serve in the foreground until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed cannot be loaded or the address cannot
    /// be bound.
    pub async fn run(config: ServerConfig) -> Result<()> {
        let store = match &config.data {
            Some(path) => MemoryStore::load(path)?,
            None => MemoryStore::new(),
        };

        let mut state = ServerState::new(store).with_early_return(config.early_return);
        if let Some(token) = &config.token {
            state = state.with_required_token(token);
        }

        let listener = TcpListener::bind(config.addr).await?;
        let tables = state.store().table_names()?;
        tracing::info!(
            addr = %listener.local_addr()?,
            ?tables,
            early_return = %config.early_return,
            "listening"
        );

        axum::serve(listener, Self::router(state.shared()))
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for Ctrl-C");
                }
                tracing::info!("shutting down");
            })
            .await?;

        Ok(())
    }

    /// Get the base URL of the server.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get access to the server's shared state.
    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    /// Shutdown the server.
    ///
    /// This aborts the server task.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }

    /// Create the axum router with all routes.
    pub fn router(state: Arc<ServerState>) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route(
                "/:resource/:id",
                get(handlers::show_record)
                    .put(handlers::update_record)
                    .patch(handlers::update_record),
            )
            .with_state(state)
    }
}
