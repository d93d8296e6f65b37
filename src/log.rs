//! Failure logging capability.

use crate::payload::Payload;

/// Records update failures together with the payload that caused them.
pub trait FailureLog: Send + Sync {
    fn log_failure(&self, message: &str, context: &Payload);
}

/// [`FailureLog`] that emits a `tracing` error event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailureLog;

impl FailureLog for TracingFailureLog {
    fn log_failure(&self, message: &str, context: &Payload) {
        tracing::error!(payload = %context, "{message}");
    }
}
