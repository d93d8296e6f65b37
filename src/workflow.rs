//! The update workflow.
//!
//! [`UpdateWorkflow`] validates a payload, locates the record, applies the
//! update inside a transaction and turns whatever happened into a response
//! through the hooks of an [`UpdateResource`].

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::log::{FailureLog, TracingFailureLog};
use crate::payload::Payload;
use crate::traits::UpdateResource;
use crate::transaction::{EarlyReturnPolicy, TransactionManager, TransactionScope};
use crate::validation::ValidationErrors;

/// The hook that short-circuited an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// `before_update`, after the transaction was opened.
    BeforeUpdate,
    /// `before_response`, after the update was applied.
    BeforeResponse,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BeforeUpdate => "before_update",
            Self::BeforeResponse => "before_response",
        })
    }
}

/// How an update ended.
#[derive(Debug)]
pub enum UpdateOutcome<T, R> {
    /// The payload failed validation; no transaction was opened.
    ValidationFailure(ValidationErrors),
    /// No record matched the identifier; no transaction was opened.
    NotFound,
    /// The update failed and was rolled back.
    UpdateFailure,
    /// A hook returned its own response.
    Intercepted { stage: HookStage, response: R },
    /// The update was committed.
    Success(T),
}

impl<T, R> UpdateOutcome<T, R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The updated record, if the update was committed.
    pub fn record(&self) -> Option<&T> {
        match self {
            Self::Success(record) => Some(record),
            _ => None,
        }
    }

    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationFailure(_) => "validation_failure",
            Self::NotFound => "not_found",
            Self::UpdateFailure => "update_failure",
            Self::Intercepted { .. } => "intercepted",
            Self::Success(_) => "success",
        }
    }
}

/// Runs updates for one resource.
///
/// # Example
///
/// ```ignore
/// let workflow = UpdateWorkflow::new(users, store.clone())
///     .with_early_return(EarlyReturnPolicy::Commit);
///
/// let response = workflow.update(payload, 42).await;
/// ```
pub struct UpdateWorkflow<R: UpdateResource> {
    resource: R,
    transactions: Arc<dyn TransactionManager>,
    log: Arc<dyn FailureLog>,
    early_return: EarlyReturnPolicy,
}

impl<R: UpdateResource> fmt::Debug for UpdateWorkflow<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateWorkflow")
            .field("early_return", &self.early_return)
            .finish_non_exhaustive()
    }
}

impl<R: UpdateResource> UpdateWorkflow<R> {
    /// Create a workflow that logs failures through `tracing` and rolls
    /// back when a hook short-circuits.
    pub fn new(resource: R, transactions: Arc<dyn TransactionManager>) -> Self {
        Self {
            resource,
            transactions,
            log: Arc::new(TracingFailureLog),
            early_return: EarlyReturnPolicy::default(),
        }
    }

    /// Replace the failure log.
    pub fn with_failure_log(mut self, log: Arc<dyn FailureLog>) -> Self {
        self.log = log;
        self
    }

    /// Set what happens to the transaction when a hook short-circuits.
    pub fn with_early_return(mut self, policy: EarlyReturnPolicy) -> Self {
        self.early_return = policy;
        self
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn early_return(&self) -> EarlyReturnPolicy {
        self.early_return
    }

    /// Run the update and format the outcome as a response.
    pub async fn update(&self, payload: Payload, id: R::Id) -> R::Response {
        match self.execute(payload, &id).await {
            UpdateOutcome::ValidationFailure(errors) => {
                self.resource.validation_failed_response(errors)
            }
            UpdateOutcome::NotFound => self.resource.not_found_response(&id),
            UpdateOutcome::UpdateFailure => self.resource.update_failed_response(),
            UpdateOutcome::Intercepted { response, .. } => response,
            UpdateOutcome::Success(record) => self.resource.format_response(record),
        }
    }

    /// Run the update and report how it ended.
    ///
    /// Never fails: every error is logged and mapped to
    /// [`UpdateOutcome::UpdateFailure`].
    #[tracing::instrument(skip_all, fields(id = %id))]
    pub async fn execute(
        &self,
        payload: Payload,
        id: &R::Id,
    ) -> UpdateOutcome<R::Record, R::Response> {
        if let Some(errors) = self.resource.validate(&payload, id) {
            tracing::debug!(fields = errors.len(), "payload failed validation");
            return UpdateOutcome::ValidationFailure(errors);
        }

        let mut record = match self.resource.locate(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("record not found");
                return UpdateOutcome::NotFound;
            }
            Err(e) => {
                self.log.log_failure(&format!("Update: {e}"), &payload);
                return UpdateOutcome::UpdateFailure;
            }
        };

        let mut scope = match TransactionScope::begin(self.transactions.as_ref()) {
            Ok(scope) => scope,
            Err(e) => return self.fail(None, &e.to_string(), &payload).await,
        };

        let payload = match self.resource.before_update(payload.clone()).await {
            Ok(ControlFlow::Continue(payload)) => payload,
            Ok(ControlFlow::Break(response)) => {
                return self.intercept(scope, HookStage::BeforeUpdate, response);
            }
            Err(e) => return self.fail(Some(scope), &e.to_string(), &payload).await,
        };

        match self.resource.apply_update(&mut record, &payload).await {
            Ok(true) => {}
            Ok(false) => {
                return self
                    .fail(Some(scope), "update method returned false", &payload)
                    .await;
            }
            Err(e) => return self.fail(Some(scope), &e.to_string(), &payload).await,
        }

        if let Some(response) = self.resource.before_response(&mut record).await {
            return self.intercept(scope, HookStage::BeforeResponse, response);
        }

        if let Err(e) = scope.try_commit() {
            return self.fail(Some(scope), &e.to_string(), &payload).await;
        }

        tracing::debug!("update committed");
        UpdateOutcome::Success(record)
    }

    async fn fail(
        &self,
        scope: Option<TransactionScope<'_>>,
        reason: &str,
        payload: &Payload,
    ) -> UpdateOutcome<R::Record, R::Response> {
        self.log.log_failure(&format!("Update: {reason}"), payload);
        self.resource.rollback_update().await;

        if let Some(scope) = scope {
            if let Err(e) = scope.rollback() {
                tracing::error!(error = %e, "rollback after failed update failed");
            }
        }

        UpdateOutcome::UpdateFailure
    }

    fn intercept(
        &self,
        scope: TransactionScope<'_>,
        stage: HookStage,
        response: R::Response,
    ) -> UpdateOutcome<R::Record, R::Response> {
        tracing::debug!(%stage, policy = %self.early_return, "hook short-circuited update");

        if let Err(e) = scope.finish_early(self.early_return) {
            tracing::error!(error = %e, %stage, "could not resolve transaction after hook");
        }

        UpdateOutcome::Intercepted { stage, response }
    }
}
