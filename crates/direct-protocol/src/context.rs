//! Request context: the value injected as the first argument of every call.
//!
//! The transport builds one [`RequestContext`] per HTTP request. All calls
//! of a batch share it; form calls additionally carry the decoded form so
//! their handlers can read method-specific fields and uploaded files.

use std::sync::Arc;

use crate::envelope::FormFields;

/// Context for a single inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Unique identifier of the HTTP request, used for log correlation.
    pub request_id: String,
    /// Submitted form, set only on the form path.
    pub form: Option<Arc<FormFields>>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            form: None,
        }
    }

    pub fn with_form(mut self, form: FormFields) -> Self {
        self.form = Some(Arc::new(form));
        self
    }

    pub fn form(&self) -> Option<&FormFields> {
        self.form.as_deref()
    }
}
