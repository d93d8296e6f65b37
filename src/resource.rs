//! Ready-made [`UpdateResource`] backed by a [`MemoryStore`] table.

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::payload::{Payload, ResourceId};
use crate::response::{display_name, ApiResponse};
use crate::store::{MemoryStore, Record};
use crate::traits::UpdateResource;
use crate::validation::{Rules, ValidationErrors};
use crate::workflow::UpdateWorkflow;

/// Updates records of one store table and answers with [`ApiResponse`]s.
///
/// Validation rules come from the table definition. A read-only table
/// answers every update with 403 from `before_update`; unique fields that
/// clash after the update answer 409 from `before_response`, and the
/// workflow's early-return policy decides what happens to the write.
#[derive(Debug, Clone)]
pub struct StoreResource {
    store: MemoryStore,
    table: String,
    label: String,
}

impl StoreResource {
    pub fn new(store: MemoryStore, table: impl Into<String>) -> Self {
        let table = table.into();
        let label = display_name(&table);
        Self {
            store,
            table,
            label,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wrap in a workflow that uses the same store for transactions.
    pub fn into_workflow(self) -> UpdateWorkflow<Self> {
        let transactions = Arc::new(self.store.clone());
        UpdateWorkflow::new(self, transactions)
    }
}

#[async_trait]
impl UpdateResource for StoreResource {
    type Id = ResourceId;
    type Record = Record;
    type Response = ApiResponse;

    fn validation_rules(&self, _payload: &Payload, _id: &ResourceId) -> Rules {
        self.store.rules(&self.table).unwrap_or_else(|e| {
            tracing::warn!(table = %self.table, error = %e, "no rules available");
            Rules::new()
        })
    }

    async fn locate(&self, id: &ResourceId) -> Result<Option<Record>> {
        self.store.find(&self.table, id)
    }

    async fn apply_update(&self, record: &mut Record, payload: &Payload) -> Result<bool> {
        self.store.update(&self.table, record, payload)
    }

    async fn before_update(&self, payload: Payload) -> Result<ControlFlow<ApiResponse, Payload>> {
        if self.store.is_read_only(&self.table)? {
            tracing::debug!(table = %self.table, "refusing update of read-only table");
            return Ok(ControlFlow::Break(ApiResponse::error(
                403,
                format!("{} records are read-only", self.label),
            )));
        }
        Ok(ControlFlow::Continue(payload))
    }

    async fn before_response(&self, record: &mut Record) -> Option<ApiResponse> {
        let taken = match self.store.conflicts(&self.table, record) {
            Ok(taken) => taken,
            Err(e) => {
                tracing::warn!(table = %self.table, error = %e, "could not check unique fields");
                return None;
            }
        };
        if taken.is_empty() {
            return None;
        }

        let mut errors = ValidationErrors::new();
        for field in taken {
            let message = format!("The {field} has already been taken.");
            errors.add(field, message);
        }
        Some(ApiResponse::conflict(&errors))
    }

    fn validation_failed_response(&self, errors: ValidationErrors) -> ApiResponse {
        ApiResponse::validation_failed(&errors)
    }

    fn not_found_response(&self, _id: &ResourceId) -> ApiResponse {
        ApiResponse::not_found(&self.label)
    }

    fn update_failed_response(&self) -> ApiResponse {
        ApiResponse::update_failed()
    }

    fn format_response(&self, record: Record) -> ApiResponse {
        ApiResponse::ok(&record)
    }
}
