//! API descriptor builder: renders the registry as a client manifest.

use direct_protocol::{ApiDescriptor, Manifest, MethodDescriptor};
use serde_json::Value;

use crate::registry::MethodRegistry;

/// Header the bootstrap script attaches the CSRF token to.
const CSRF_HEADER: &str = "X-CSRFToken";

/// Settings for the script rendering of the descriptor.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Client-side variable the descriptor is assigned to.
    pub name: String,
    /// Append the token hook and provider registration lines.
    pub autoadd: bool,
    /// Cookie the token hook reads.
    pub csrf_cookie: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "Ext.app.REMOTING_API".into(),
            autoadd: true,
            csrf_cookie: "csrftoken".into(),
        }
    }
}

/// One entry per registered method: `{name, len, ...flags}`.
///
/// Flags are merged last and win over `name`/`len` on key collisions.
pub fn build_manifest(registry: &MethodRegistry) -> Manifest {
    let mut actions = Manifest::new();
    for method in registry.methods() {
        let mut entry = MethodDescriptor::new();
        entry.insert("name".into(), Value::from(method.name()));
        entry.insert("len".into(), Value::from(method.param_count()));
        for (key, value) in method.flags() {
            entry.insert(key.clone(), value.clone());
        }
        actions
            .entry(method.namespace().to_string())
            .or_default()
            .push(entry);
    }
    actions
}

/// Data form of the descriptor, served as JSON.
pub fn build_descriptor(registry: &MethodRegistry, url: &str) -> ApiDescriptor {
    ApiDescriptor::remoting(url, build_manifest(registry))
}

/// Script form: `<name> = <descriptor>;` plus optional bootstrap lines.
pub fn render_script(
    registry: &MethodRegistry,
    url: &str,
    provider: &ProviderConfig,
) -> Result<String, serde_json::Error> {
    let descriptor = serde_json::to_string(&build_descriptor(registry, url))?;
    let mut lines = vec![format!("{} = {};", provider.name, descriptor)];

    if provider.autoadd {
        lines.push(format!(
            concat!(
                r#"Ext.Ajax.on("beforerequest", function(conn, options){{"#,
                r#"    if( !options.headers )"#,
                r#"        options.headers = {{}};"#,
                r#"    options.headers["{header}"] = Ext.util.Cookies.get("{cookie}");"#,
                r#"}});"#,
            ),
            header = CSRF_HEADER,
            cookie = provider.csrf_cookie,
        ));
        lines.push(format!("Ext.Direct.addProvider( {} );", provider.name));
    }

    Ok(lines.join("\n"))
}
