//! Transactional resource updates.
//!
//! A Rust library for the "update a resource" operation of a web
//! controller: validate the payload, locate the record, apply the update
//! inside a transaction, and turn the result into a response, with hooks
//! around each step.
//!
//! # Quick Start
//!
//! ```
//! use crudkit::{MemoryStore, Payload, Record, ResourceId, StoreResource, TableDefinition};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new().with_table(
//!     "users",
//!     TableDefinition {
//!         records: vec![Record::new(42).with("name", "Alice")],
//!         ..Default::default()
//!     },
//! );
//!
//! let workflow = StoreResource::new(store, "users").into_workflow();
//! let response = workflow
//!     .update(Payload::new().with("name", "Bob"), ResourceId::Int(42))
//!     .await;
//!
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body["data"]["name"], "Bob");
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`UpdateResource`] - the capabilities a resource supplies (locate,
//!   apply, responses) plus optional hooks
//! - [`UpdateWorkflow`] - runs one update and reports an [`UpdateOutcome`]
//! - [`TransactionManager`] / [`TransactionScope`] - begin/commit/rollback,
//!   rolled back automatically unless resolved
//! - [`FailureLog`] - where failed updates are reported
//! - [`MemoryStore`] - in-memory transactional tables used by
//!   [`StoreResource`] and the HTTP server
//!
//! # Configuration
//!
//! The client and server read configuration from environment variables;
//! see [`config`].

mod client;
pub mod config;
mod error;
mod log;
mod payload;
mod resource;
mod response;
mod store;
mod traits;
mod transaction;
mod validation;
mod workflow;

pub mod cli;
pub mod output;

#[cfg(feature = "server")]
pub mod http;

// Re-export core types
pub use client::ResourceClient;
pub use config::ServerConfig;
pub use error::{CrudError, Result};
pub use payload::{Payload, ResourceId};
pub use response::ApiResponse;

// Re-export traits
pub use traits::UpdateResource;

// Re-export workflow pieces
pub use log::{FailureLog, TracingFailureLog};
pub use transaction::{EarlyReturnPolicy, TransactionManager, TransactionScope};
pub use validation::{Rule, Rules, ValidationErrors};
pub use workflow::{HookStage, UpdateOutcome, UpdateWorkflow};

// Re-export the store
pub use resource::StoreResource;
pub use store::{MemoryStore, Record, Seed, TableDefinition};
