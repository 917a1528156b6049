//! Dispatcher tests, driven through `DirectServer` without a socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use direct_protocol::{
    DirectResponse, FormFields, FormReply, FormRequest, MethodError, MethodResult,
    RequestContext,
};
use direct_server::{DirectServer, MethodRegistry, MethodSpec, ServerConfig};
use serde_json::{Value, json};

const SECRET: &str = "connection string postgres://admin:hunter2@db";

async fn add(_ctx: RequestContext, args: Vec<Value>) -> MethodResult {
    let a = args[0].as_i64().unwrap_or_default();
    let b = args[1].as_i64().unwrap_or_default();
    Ok(json!(a + b))
}

async fn args_echo(_ctx: RequestContext, args: Vec<Value>) -> MethodResult {
    Ok(Value::Array(args))
}

async fn ping(_ctx: RequestContext, _args: Vec<Value>) -> MethodResult {
    Ok(json!("pong"))
}

async fn leak(_ctx: RequestContext, _args: Vec<Value>) -> MethodResult {
    Err(MethodError::new(SECRET).with_detail("db.rs:42"))
}

async fn refuse(_ctx: RequestContext, _args: Vec<Value>) -> MethodResult {
    Err(MethodError::visible("Quota exceeded."))
}

async fn form_title(ctx: RequestContext, _args: Vec<Value>) -> MethodResult {
    let title = ctx.form().and_then(|f| f.get("title")).unwrap_or_default();
    Ok(json!({ "title": title }))
}

fn registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    registry
        .register("Calc", MethodSpec::new("add", ["a", "b"]), add)
        .register("Calc", MethodSpec::new("echo", ["a", "b"]), args_echo)
        .register("Calc", MethodSpec::new("ping", Vec::<String>::new()), ping)
        .register("Calc", MethodSpec::new("leak", Vec::<String>::new()), leak)
        .register("Calc", MethodSpec::new("refuse", Vec::<String>::new()), refuse)
        .register(
            "Profile",
            MethodSpec::new("save", Vec::<String>::new()).with_flag("formHandler", true),
            form_title,
        )
        .register(
            "Profile",
            MethodSpec::new("fail", Vec::<String>::new()).with_flag("formHandler", true),
            leak,
        );
    registry
}

fn server(config: ServerConfig) -> DirectServer {
    DirectServer::new(registry(), config)
}

fn production() -> DirectServer {
    server(ServerConfig::default())
}

fn debug() -> DirectServer {
    server(ServerConfig {
        debug: true,
        ..ServerConfig::default()
    })
}

async fn batch(server: &DirectServer, body: Value) -> Value {
    let body = serde_json::to_vec(&body).unwrap();
    let reply = server.process_batch(&RequestContext::new("test"), &body).await;
    serde_json::to_value(reply).unwrap()
}

fn call(action: &str, method: &str, data: Value, tid: i64) -> Value {
    json!({"action": action, "method": method, "data": data, "type": "rpc", "tid": tid})
}

fn form(action: &str, method: &str, upload: bool, extra: &[(&str, &str)]) -> FormRequest {
    let upload = if upload { "true" } else { "false" };
    let mut fields = FormFields::from_pairs([
        ("extAction", action),
        ("extMethod", method),
        ("extType", "rpc"),
        ("extUpload", upload),
        ("extTID", "11"),
    ]);
    for (name, value) in extra {
        fields.insert_text(*name, *value);
    }
    FormRequest::from_fields(fields).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch path
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_call_is_unwrapped() {
    let reply = batch(&production(), call("Calc", "add", json!([1, 2]), 1)).await;
    assert_eq!(
        reply,
        json!({"type": "rpc", "tid": 1, "action": "Calc", "method": "add", "result": 3})
    );
}

#[tokio::test]
async fn singleton_array_is_unwrapped_too() {
    let reply = batch(&production(), json!([call("Calc", "ping", Value::Null, 4)])).await;
    assert!(reply.is_object());
    assert_eq!(reply["result"], "pong");
}

#[tokio::test]
async fn batch_preserves_order_and_count() {
    let reply = batch(
        &production(),
        json!([
            call("Calc", "add", json!([1, 1]), 1),
            call("Nope", "add", json!([]), 2),
            call("Calc", "add", json!([2]), 3),
            call("Calc", "ping", Value::Null, 4),
        ]),
    )
    .await;

    let records = reply.as_array().unwrap();
    assert_eq!(records.len(), 4);
    let tids: Vec<_> = records.iter().map(|r| r["tid"].as_i64().unwrap()).collect();
    assert_eq!(tids, [1, 2, 3, 4]);
    assert_eq!(records[0]["result"], 2);
    assert_eq!(records[1]["type"], "exception");
    assert_eq!(records[2]["message"], "invalid arguments");
    assert_eq!(records[3]["result"], "pong");
}

#[tokio::test]
async fn unknown_action() {
    let reply = batch(&production(), call("Ghost", "add", json!([]), 5)).await;
    assert_eq!(
        reply,
        json!({"type": "exception", "tid": 5, "message": "no such action", "where": "Ghost"})
    );
}

#[tokio::test]
async fn unknown_method() {
    let reply = batch(&production(), call("Calc", "divide", json!([]), 6)).await;
    assert_eq!(reply["type"], "exception");
    assert_eq!(reply["message"], "no such method");
    assert_eq!(reply["where"], "divide");
    assert_eq!(reply["tid"], 6);
}

#[tokio::test]
async fn named_arguments_are_bound_positionally() {
    let reply = batch(&production(), call("Calc", "echo", json!([{"b": 2, "a": 1}]), 7)).await;
    assert_eq!(reply["result"], json!([1, 2]));
}

#[tokio::test]
async fn incomplete_named_arguments_fail_arity() {
    let reply = batch(&production(), call("Calc", "echo", json!([{"a": 1}]), 8)).await;
    assert_eq!(reply["message"], "invalid arguments");
    assert_eq!(reply["where"], "Expected 2, got 1");
}

#[tokio::test]
async fn arity_mismatch() {
    let reply = batch(&production(), call("Calc", "add", json!([1]), 9)).await;
    assert_eq!(
        reply,
        json!({"type": "exception", "tid": 9, "message": "invalid arguments", "where": "Expected 2, got 1"})
    );
}

#[tokio::test]
async fn null_data_counts_as_zero_arguments() {
    let reply = batch(&production(), call("Calc", "add", Value::Null, 10)).await;
    assert_eq!(reply["where"], "Expected 2, got 0");

    let reply = batch(&production(), json!({"action": "Calc", "method": "ping", "tid": 11})).await;
    assert_eq!(reply["result"], "pong");
    assert_eq!(reply["type"], "rpc");
}

#[tokio::test]
async fn tid_is_echoed_verbatim() {
    let mut envelope = call("Calc", "ping", Value::Null, 0);
    envelope["tid"] = json!("abc-1");
    let reply = batch(&production(), envelope).await;
    assert_eq!(reply["tid"], "abc-1");
}

#[tokio::test]
async fn malformed_body() {
    let reply = production()
        .process_batch(&RequestContext::new("test"), b"{not json")
        .await;
    let reply = serde_json::to_value(reply).unwrap();
    assert_eq!(reply["type"], "exception");
    assert_eq!(reply["message"], "malformed request");
    assert!(reply["tid"].is_null());
}

#[tokio::test]
async fn malformed_element_does_not_sink_the_batch() {
    let reply = batch(
        &production(),
        json!([{"tid": 1, "data": []}, 42, call("Calc", "ping", Value::Null, 3)]),
    )
    .await;
    let records = reply.as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["message"], "malformed request");
    assert_eq!(records[0]["tid"], 1);
    assert_eq!(records[1]["message"], "malformed request");
    assert!(records[1]["tid"].is_null());
    assert_eq!(records[2]["result"], "pong");
}

#[tokio::test]
async fn empty_batch_yields_empty_array() {
    assert_eq!(batch(&production(), json!([])).await, json!([]));
}

// ─────────────────────────────────────────────────────────────────────────────
// Redaction
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn production_redacts_internal_failures() {
    let reply = batch(&production(), call("Calc", "leak", Value::Null, 12)).await;
    assert_eq!(reply["type"], "exception");
    assert_eq!(reply["message"], "Internal error.");
    assert_eq!(reply["where"], "");
    assert!(!reply.to_string().contains("hunter2"));
}

#[tokio::test]
async fn production_uses_configured_generic_message() {
    let server = server(ServerConfig {
        generic_error: "Erro Interno.".into(),
        ..ServerConfig::default()
    });
    let reply = batch(&server, call("Calc", "leak", Value::Null, 13)).await;
    assert_eq!(reply["message"], "Erro Interno.");
}

#[tokio::test]
async fn production_discloses_visible_failures() {
    let reply = batch(&production(), call("Calc", "refuse", Value::Null, 14)).await;
    assert_eq!(
        reply,
        json!({"type": "exception", "tid": 14, "message": "Quota exceeded.", "where": ""})
    );
}

#[tokio::test]
async fn debug_discloses_detail() {
    let reply = batch(&debug(), call("Calc", "leak", Value::Null, 15)).await;
    assert_eq!(reply["message"], SECRET);
    let location = reply["where"].as_str().unwrap();
    assert!(location.contains("Calc.leak"));
    assert!(location.contains("db.rs:42"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_batches_keep_input_order() {
    let started = Arc::new(AtomicUsize::new(0));
    let mut registry = MethodRegistry::new();
    let counter = started.clone();
    registry.register(
        "Slow",
        MethodSpec::new("wait", ["ms"]),
        move |_ctx: RequestContext, args: Vec<Value>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let ms = args[0].as_u64().unwrap_or_default();
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, MethodError>(json!(ms))
            }
        },
    );
    let server = DirectServer::new(
        registry,
        ServerConfig {
            concurrent_batches: true,
            ..ServerConfig::default()
        },
    );

    let reply = batch(
        &server,
        json!([
            call("Slow", "wait", json!([60]), 1),
            call("Slow", "wait", json!([1]), 2),
            call("Slow", "wait", json!([30]), 3),
        ]),
    )
    .await;

    let results: Vec<_> = reply.as_array().unwrap().iter().map(|r| r["result"].clone()).collect();
    assert_eq!(results, [json!(60), json!(1), json!(30)]);
    assert_eq!(started.load(Ordering::SeqCst), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Form path
// ─────────────────────────────────────────────────────────────────────────────

fn json_record(reply: FormReply) -> DirectResponse {
    match reply {
        FormReply::Json(record) => record,
        FormReply::Upload(record) => panic!("expected JSON reply, got upload {record:?}"),
    }
}

#[tokio::test]
async fn form_call_sees_its_fields() {
    let reply = production()
        .process_form(
            &RequestContext::new("f"),
            form("Profile", "save", false, &[("title", "Dr.")]),
        )
        .await;
    let record = serde_json::to_value(json_record(reply)).unwrap();
    assert_eq!(
        record,
        json!({"type": "rpc", "tid": "11", "action": "Profile", "method": "save", "result": {"title": "Dr."}})
    );
}

#[tokio::test]
async fn form_unknown_action_and_method() {
    let server = production();
    let ctx = RequestContext::new("f");

    let record = json_record(server.process_form(&ctx, form("Ghost", "save", false, &[])).await);
    let record = serde_json::to_value(record).unwrap();
    assert_eq!(record["message"], "no such action");
    assert_eq!(record["where"], "Ghost");

    let record = json_record(server.process_form(&ctx, form("Profile", "nope", false, &[])).await);
    let record = serde_json::to_value(record).unwrap();
    assert_eq!(record["message"], "no such method");
    assert_eq!(record["where"], "nope");
}

#[tokio::test]
async fn form_failures_use_the_form_message() {
    let reply = production()
        .process_form(&RequestContext::new("f"), form("Profile", "fail", false, &[]))
        .await;
    let record = serde_json::to_value(json_record(reply)).unwrap();
    assert_eq!(record["message"], "The socket packet pocket has an error to report.");
    assert_eq!(record["where"], "");
    assert_eq!(record["tid"], "11");
}

#[tokio::test]
async fn upload_success_shape() {
    let reply = production()
        .process_form(
            &RequestContext::new("f"),
            form("Profile", "save", true, &[("title", "x")]),
        )
        .await;
    let FormReply::Upload(record) = reply else {
        panic!("expected upload reply");
    };
    assert!(record.success);
    assert_eq!(record.result, json!({"title": "x"}));
    assert_eq!(record.tid, json!("11"));
    assert_eq!(record.call_type, "rpc");
}

#[tokio::test]
async fn upload_failure_still_reports_success_by_default() {
    let reply = production()
        .process_form(&RequestContext::new("f"), form("Profile", "fail", true, &[]))
        .await;
    let FormReply::Upload(record) = reply else {
        panic!("expected upload reply");
    };
    assert!(record.success);
    assert!(record.result.is_null());
    assert_eq!(record.action, "Profile");
    assert_eq!(record.method, "fail");
}

#[tokio::test]
async fn strict_upload_status_reports_failure() {
    let server = server(ServerConfig {
        upload_reports_failure: true,
        ..ServerConfig::default()
    });
    let reply = server
        .process_form(&RequestContext::new("f"), form("Profile", "fail", true, &[]))
        .await;
    let FormReply::Upload(record) = reply else {
        panic!("expected upload reply");
    };
    assert!(!record.success);
    assert_eq!(record.result["type"], "exception");
    assert!(!record.result.to_string().contains("hunter2"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptor
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn descriptor_lists_every_method_once() {
    let server = production();
    let api = server.api_descriptor("/api/router");
    let total: usize = api.actions.values().map(Vec::len).sum();
    assert_eq!(total, server.registry().len());

    for method in server.registry().methods() {
        let entry = api.method(method.namespace(), method.name()).unwrap();
        assert_eq!(entry["len"], method.param_count());
    }
    assert_eq!(api.method("Profile", "save").unwrap()["formHandler"], true);
}
