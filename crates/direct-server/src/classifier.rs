//! Error classifier. Decides how much failure detail reaches the client.

use direct_protocol::{DispatchError, ExceptionRecord, MethodError};
use serde_json::Value;
use tracing::error;

/// Turns dispatch failures into exception records.
///
/// Protocol-level failures always disclose their `where` detail. Invocation
/// failures are redacted unless the server runs in debug mode or the error
/// is marked disclosable.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    debug: bool,
}

impl ErrorClassifier {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Classify a failure of the call `action.method`.
    ///
    /// `fallback` is the generic phrase used in production mode for
    /// invocation failures that may not be shown.
    pub fn classify(
        &self,
        tid: Value,
        action: &str,
        method: &str,
        err: &DispatchError,
        fallback: &str,
    ) -> ExceptionRecord {
        match err {
            DispatchError::Invocation(failure) => {
                self.classify_invocation(tid, action, method, failure, fallback)
            }
            other => ExceptionRecord::protocol(tid, other),
        }
    }

    fn classify_invocation(
        &self,
        tid: Value,
        action: &str,
        method: &str,
        failure: &MethodError,
        fallback: &str,
    ) -> ExceptionRecord {
        if self.debug {
            let location = match failure.detail() {
                Some(detail) => format!("{action}.{method}\n{detail}"),
                None => format!("{action}.{method}"),
            };
            error!(
                "Method {action}.{method} failed: {}\n{}",
                failure.message(),
                failure.detail().unwrap_or("(no detail)")
            );
            return ExceptionRecord::new(tid, failure.message(), location);
        }

        error!("Method {action}.{method} failed: {}", failure.message());
        if failure.is_disclosable() {
            ExceptionRecord::new(tid, failure.message(), "")
        } else {
            ExceptionRecord::new(tid, fallback, "")
        }
    }
}
