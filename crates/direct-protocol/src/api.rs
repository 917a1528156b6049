//! API descriptor, the self-describing manifest advertised to clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Descriptor `type` for remoting providers.
pub const REMOTING: &str = "remoting";

/// One method entry: `name`, `len` and any capability flags merged in.
pub type MethodDescriptor = Map<String, Value>;

/// Namespace → method entries.
pub type Manifest = BTreeMap<String, Vec<MethodDescriptor>>;

/// Full descriptor as served by `api.json` and embedded by `api.js`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub actions: Manifest,
}

impl ApiDescriptor {
    pub fn remoting(url: impl Into<String>, actions: Manifest) -> Self {
        Self {
            url: url.into(),
            kind: REMOTING.into(),
            actions,
        }
    }

    /// Look up a method entry by namespace and name.
    pub fn method(&self, action: &str, name: &str) -> Option<&MethodDescriptor> {
        self.actions
            .get(action)?
            .iter()
            .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))
    }
}
