//! Failure types: the protocol-level dispatch taxonomy and the error a
//! registered method returns.

use std::any::Any;

/// Client-facing message for a body or envelope that could not be decoded.
pub const MALFORMED_REQUEST: &str = "malformed request";
/// Client-facing message for an unregistered namespace.
pub const NO_SUCH_ACTION: &str = "no such action";
/// Client-facing message for an unregistered method in a known namespace.
pub const NO_SUCH_METHOD: &str = "no such method";
/// Client-facing message for an argument count mismatch.
pub const INVALID_ARGUMENTS: &str = "invalid arguments";

/// Result of invoking a registered method.
pub type MethodResult = Result<serde_json::Value, MethodError>;

/// Everything that can go wrong while dispatching one call.
///
/// All kinds are converted into exception records at the dispatch
/// boundary. Only [`DispatchError::Invocation`] is subject to redaction;
/// the others describe protocol mistakes and always disclose `where`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("no such action: {0}")]
    UnknownAction(String),

    #[error("no such method: {0}")]
    UnknownMethod(String),

    #[error("invalid arguments: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Invocation(#[from] MethodError),
}

impl DispatchError {
    /// The fixed message placed in the exception record's `message` field.
    ///
    /// For invocation failures this is the method's own message; whether it
    /// actually reaches the client is decided by the error classifier.
    pub fn client_message(&self) -> &str {
        match self {
            Self::MalformedRequest(_) => MALFORMED_REQUEST,
            Self::UnknownAction(_) => NO_SUCH_ACTION,
            Self::UnknownMethod(_) => NO_SUCH_METHOD,
            Self::ArityMismatch { .. } => INVALID_ARGUMENTS,
            Self::Invocation(err) => err.message(),
        }
    }

    /// The `where` detail for protocol-level failures.
    pub fn location(&self) -> String {
        match self {
            Self::MalformedRequest(detail) => detail.clone(),
            Self::UnknownAction(action) => action.clone(),
            Self::UnknownMethod(method) => method.clone(),
            Self::ArityMismatch { expected, got } => format!("Expected {expected}, got {got}"),
            Self::Invocation(err) => err.detail().unwrap_or_default().to_string(),
        }
    }

    pub fn is_invocation(&self) -> bool {
        matches!(self, Self::Invocation(_))
    }
}

/// Failure raised by a registered method.
///
/// `disclosable` marks the message as safe to show to clients even when the
/// server runs in production mode. It is set explicitly by whoever builds
/// the error and defaults to `false`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct MethodError {
    message: String,
    disclosable: bool,
    detail: Option<String>,
}

impl MethodError {
    /// An internal failure whose text must not leak in production.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            disclosable: false,
            detail: None,
        }
    }

    /// A failure whose message is meant for the client.
    pub fn visible(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            disclosable: true,
            detail: None,
        }
    }

    /// Attach diagnostic detail (cause chain, backtrace, offending input).
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Build an internal failure from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let reason = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(format!("method panicked: {reason}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_disclosable(&self) -> bool {
        self.disclosable
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<anyhow::Error> for MethodError {
    fn from(err: anyhow::Error) -> Self {
        // `{:?}` on anyhow renders the cause chain plus a backtrace when one was captured.
        Self::new(err.to_string()).with_detail(format!("{err:?}"))
    }
}

impl From<serde_json::Error> for MethodError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("invalid value: {err}"))
    }
}
