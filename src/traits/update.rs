//! Update trait: the capability set an updatable resource supplies.

use std::fmt;
use std::ops::ControlFlow;

use async_trait::async_trait;

use crate::error::Result;
use crate::payload::Payload;
use crate::validation::{Rules, ValidationErrors};

/// Locate, apply and respond for one kind of resource.
///
/// Required methods cover the collaborators the update workflow cannot
/// work without. Hooks have no-op defaults and can be overridden to
/// adjust the payload, intercept the response, or clean up after a
/// failed update.
///
/// # Example
///
/// ```ignore
/// struct Users { db: Db }
///
/// #[async_trait]
/// impl UpdateResource for Users {
///     type Id = i64;
///     type Record = User;
///     type Response = ApiResponse;
///
///     async fn locate(&self, id: &i64) -> Result<Option<User>> {
///         self.db.find_user(*id).await
///     }
///
///     async fn apply_update(&self, user: &mut User, payload: &Payload) -> Result<bool> {
///         self.db.update_user(user, payload).await
///     }
///
///     fn not_found_response(&self, _id: &i64) -> ApiResponse { ApiResponse::not_found("User") }
///     fn update_failed_response(&self) -> ApiResponse { ApiResponse::update_failed() }
///     fn format_response(&self, user: User) -> ApiResponse { ApiResponse::ok(&user) }
/// }
/// ```
#[async_trait]
pub trait UpdateResource: Send + Sync {
    /// Identifier type for this resource.
    type Id: fmt::Display + Send + Sync;

    /// The persisted entity.
    type Record: Send;

    /// Whatever the caller sends back to the client.
    type Response: Send;

    /// Rules the payload must satisfy. Defaults to none.
    fn validation_rules(&self, _payload: &Payload, _id: &Self::Id) -> Rules {
        Rules::new()
    }

    /// Validate the payload; `None` means valid.
    fn validate(&self, payload: &Payload, id: &Self::Id) -> Option<ValidationErrors> {
        self.validation_rules(payload, id).check(payload)
    }

    /// Find the record to update.
    async fn locate(&self, id: &Self::Id) -> Result<Option<Self::Record>>;

    /// Write the payload to the record.
    ///
    /// `Ok(false)` signals a failed update just like an error does.
    async fn apply_update(&self, record: &mut Self::Record, payload: &Payload) -> Result<bool>;

    /// Called inside the transaction before the update is applied.
    ///
    /// Return `Continue` with the (possibly modified) payload to proceed,
    /// or `Break` with a response to stop here.
    async fn before_update(
        &self,
        payload: Payload,
    ) -> Result<ControlFlow<Self::Response, Payload>> {
        Ok(ControlFlow::Continue(payload))
    }

    /// Called after a failed update, before the transaction is rolled back.
    async fn rollback_update(&self) {}

    /// Called after a successful update, before commit.
    ///
    /// Returning a response skips the formatter.
    async fn before_response(&self, _record: &mut Self::Record) -> Option<Self::Response> {
        None
    }

    /// Response for a payload that failed validation.
    fn validation_failed_response(&self, errors: ValidationErrors) -> Self::Response;

    /// Response for an identifier with no matching record.
    fn not_found_response(&self, id: &Self::Id) -> Self::Response;

    /// Response for an update that failed and was rolled back.
    fn update_failed_response(&self) -> Self::Response;

    /// Response for a committed update.
    fn format_response(&self, record: Self::Record) -> Self::Response;
}
