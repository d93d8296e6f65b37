//! HTTP endpoint for resource updates.
//!
//! An axum server that exposes every table of a [`MemoryStore`] as
//! `/{resource}/{id}` and runs `PUT`/`PATCH` requests through the update
//! workflow.
//!
//! # Example
//!
//! ```ignore
//! use crudkit::http::ResourceServer;
//! use crudkit::{MemoryStore, ResourceClient, ResourceId, Payload};
//!
//! #[tokio::test]
//! async fn test_workflow() {
//!     let server = ResourceServer::start(MemoryStore::load("seed.json".as_ref())?).await?;
//!     let client = ResourceClient::new(None, server.url())?;
//!
//!     let user = client
//!         .update("users", &ResourceId::Int(42), &Payload::new().with("name", "Bob"))
//!         .await?;
//!     assert_eq!(user["name"], "Bob");
//!
//!     server.shutdown().await;
//! }
//! ```
//!
//! [`MemoryStore`]: crate::MemoryStore

mod handlers;
mod server;
mod state;

pub use server::ResourceServer;
pub use state::ServerState;
