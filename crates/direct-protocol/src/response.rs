//! Outbound response records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// Successful call record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The request's call type, echoed back.
    #[serde(rename = "type")]
    pub call_type: String,
    pub tid: Value,
    pub action: String,
    pub method: String,
    pub result: Value,
}

/// Failed call record. `type` is always `"exception"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub tid: Value,
    pub message: String,
    #[serde(rename = "where", default)]
    pub location: String,
}

impl ExceptionRecord {
    pub const KIND: &'static str = "exception";

    pub fn new(tid: Value, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind: Self::KIND.into(),
            tid,
            message: message.into(),
            location: location.into(),
        }
    }

    /// Record for a protocol-level failure; always discloses `where`.
    pub fn protocol(tid: Value, err: &DispatchError) -> Self {
        Self::new(tid, err.client_message(), err.location())
    }
}

/// Response record for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectResponse {
    Result(ResultRecord),
    Exception(ExceptionRecord),
}

impl DirectResponse {
    pub fn result(
        call_type: impl Into<String>,
        tid: Value,
        action: impl Into<String>,
        method: impl Into<String>,
        result: Value,
    ) -> Self {
        Self::Result(ResultRecord {
            call_type: call_type.into(),
            tid,
            action: action.into(),
            method: method.into(),
            result,
        })
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception(_))
    }

    pub fn tid(&self) -> &Value {
        match self {
            Self::Result(r) => &r.tid,
            Self::Exception(e) => &e.tid,
        }
    }
}

impl From<ExceptionRecord> for DirectResponse {
    fn from(record: ExceptionRecord) -> Self {
        Self::Exception(record)
    }
}

/// Reply to a JSON batch body.
///
/// A batch that produced exactly one record is answered with that bare
/// record; clients rely on this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchReply {
    Single(DirectResponse),
    Many(Vec<DirectResponse>),
}

impl BatchReply {
    pub fn from_responses(mut responses: Vec<DirectResponse>) -> Self {
        if responses.len() == 1 {
            if let Some(only) = responses.pop() {
                return Self::Single(only);
            }
        }
        Self::Many(responses)
    }

    /// Reply for a body that could not be decoded at all; the tid is unknowable.
    pub fn malformed(detail: impl Into<String>) -> Self {
        let err = DispatchError::MalformedRequest(detail.into());
        Self::Single(ExceptionRecord::protocol(Value::Null, &err).into())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(all) => all.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<DirectResponse> {
        match self {
            Self::Single(only) => vec![only],
            Self::Many(all) => all,
        }
    }
}

/// Upload response, delivered as `text/html` so a hidden frame can read it.
///
/// `success` is `true` even when the call failed unless the server is
/// configured to report upload failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    #[serde(rename = "type")]
    pub call_type: String,
    pub tid: Value,
    pub action: String,
    pub method: String,
    pub result: Value,
    pub success: bool,
}

/// Reply to a form submission.
#[derive(Debug, Clone, PartialEq)]
pub enum FormReply {
    /// Plain form post, delivered as JSON.
    Json(DirectResponse),
    /// File upload, delivered as HTML.
    Upload(UploadRecord),
}
