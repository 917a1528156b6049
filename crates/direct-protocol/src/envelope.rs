//! Inbound call descriptions: batch envelopes and form submissions.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Form field carrying the target namespace.
pub const FORM_ACTION: &str = "extAction";
/// Form field carrying the target method.
pub const FORM_METHOD: &str = "extMethod";
/// Form field carrying the call type echoed in the response.
pub const FORM_TYPE: &str = "extType";
/// Form field that is `"true"` for file-upload submissions.
pub const FORM_UPLOAD: &str = "extUpload";
/// Form field carrying the transaction id.
pub const FORM_TID: &str = "extTID";

fn default_call_type() -> String {
    "rpc".into()
}

/// One call inside a JSON batch body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectRequest {
    pub action: String,
    pub method: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    #[serde(default)]
    pub tid: Value,
}

impl DirectRequest {
    /// Positional arguments as sent: null means none, an array is taken as
    /// is, any other value counts as one argument.
    pub fn positional_args(&self) -> Vec<Value> {
        match &self.data {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}

/// A file part of a multipart submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Decoded form fields, multi-valued like any HTML form.
#[derive(Debug, Clone, Default)]
pub struct FormFields {
    text: BTreeMap<String, Vec<String>>,
    files: BTreeMap<String, Vec<UploadedFile>>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = Self::new();
        for (name, value) in pairs {
            fields.insert_text(name, value);
        }
        fields
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.text.entry(name.into()).or_default().push(value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.entry(name.into()).or_default().push(file);
    }

    /// Last submitted value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.text.get(name)?.last().map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.text.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Last uploaded file for `name`.
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)?.last()
    }

    pub fn text_fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.text.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &UploadedFile)> {
        self.files
            .iter()
            .flat_map(|(k, v)| v.iter().map(move |f| (k.as_str(), f)))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.files.is_empty()
    }
}

/// A form-encoded single call, possibly carrying file uploads.
#[derive(Debug, Clone)]
pub struct FormRequest {
    pub action: String,
    pub method: String,
    pub call_type: String,
    pub upload: bool,
    pub tid: String,
    /// Every submitted field, including the `ext*` ones.
    pub fields: FormFields,
}

impl FormRequest {
    /// Build a form call when all five `ext*` fields are present.
    ///
    /// Returns `None` otherwise; the caller then treats the raw body as a
    /// JSON batch.
    pub fn from_fields(fields: FormFields) -> Option<Self> {
        let action = fields.get(FORM_ACTION)?.to_string();
        let method = fields.get(FORM_METHOD)?.to_string();
        let call_type = fields.get(FORM_TYPE)?.to_string();
        let upload = fields.get(FORM_UPLOAD)? == "true";
        let tid = fields.get(FORM_TID)?.to_string();

        Some(Self {
            action,
            method,
            call_type,
            upload,
            tid,
            fields,
        })
    }
}
