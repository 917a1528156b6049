//! Demo actions registered by the binary.

use direct_protocol::{MethodError, MethodResult, RequestContext};
use direct_server::{MethodRegistry, MethodSpec};
use serde_json::{Value, json};

/// Register the bundled demo actions.
pub fn register(registry: &mut MethodRegistry) {
    registry
        .register(
            "Namespace",
            MethodSpec::new("a_function", ["data"]),
            a_function,
        )
        .register(
            "ClassToOrganizeCode",
            MethodSpec::new("a_staticmethod", ["data"]),
            a_staticmethod,
        )
        .register(
            "Uploads",
            MethodSpec::new("submit", Vec::<String>::new()).with_flag("formHandler", true),
            submit,
        );
}

fn product(data: &Value) -> Result<f64, MethodError> {
    let factor = |key: &str| {
        data.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| MethodError::visible(format!("{key} must be a number")))
    };
    Ok(factor("property1")? * factor("property2")?)
}

async fn a_function(_ctx: RequestContext, args: Vec<Value>) -> MethodResult {
    let data = args.first().cloned().unwrap_or_default();
    Ok(json!(product(&data)?))
}

async fn a_staticmethod(_ctx: RequestContext, args: Vec<Value>) -> MethodResult {
    let data = args.first().cloned().unwrap_or_default();
    let result = product(&data)?;
    if result > 100.0 {
        return Err(MethodError::visible(format!(
            "Value is over 100, it is {result}."
        )));
    }
    Ok(json!(result))
}

/// Echo the submitted text fields and the size of each uploaded file.
async fn submit(ctx: RequestContext, _args: Vec<Value>) -> MethodResult {
    let form = ctx
        .form()
        .ok_or_else(|| MethodError::new("submit called without form data"))?;

    let fields: serde_json::Map<String, Value> = form
        .text_fields()
        .filter(|(name, _)| !name.starts_with("ext"))
        .map(|(name, values)| (name.to_string(), json!(values)))
        .collect();
    let files: Vec<Value> = form
        .files()
        .map(|(name, file)| {
            json!({
                "field": name,
                "name": file.file_name,
                "size": file.data.len(),
            })
        })
        .collect();

    Ok(json!({ "fields": fields, "files": files }))
}
