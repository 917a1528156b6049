//! Direct server router: decodes envelopes and dispatches calls to methods.

use std::sync::Arc;

use bytes::Bytes;
use direct_protocol::{
    ApiDescriptor, BatchReply, DirectRequest, DirectResponse, DispatchError, ExceptionRecord,
    FormReply, FormRequest, RequestContext, UploadRecord,
};
use direct_transport::server::RequestHandler;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{self, ProviderConfig};
use crate::classifier::ErrorClassifier;
use crate::registry::MethodRegistry;

/// Dispatcher configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Disclose failure messages and detail to clients.
    pub debug: bool,
    /// Production message for hidden failures on the batch path.
    pub generic_error: String,
    /// Production message for hidden failures on the form path.
    pub form_error: String,
    /// Run the calls of one batch concurrently.
    pub concurrent_batches: bool,
    /// Report `success: false` for failed uploads instead of always `true`.
    pub upload_reports_failure: bool,
    pub provider: ProviderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            generic_error: "Internal error.".into(),
            form_error: "The socket packet pocket has an error to report.".into(),
            concurrent_batches: false,
            upload_reports_failure: false,
            provider: ProviderConfig::default(),
        }
    }
}

/// The Direct server. Owns the frozen registry and dispatches calls.
pub struct DirectServer {
    registry: Arc<MethodRegistry>,
    classifier: ErrorClassifier,
    config: ServerConfig,
}

impl DirectServer {
    pub fn new(registry: MethodRegistry, config: ServerConfig) -> Self {
        info!(
            "Direct server ready: {} methods in {} actions (debug: {})",
            registry.len(),
            registry.actions().count(),
            config.debug
        );
        Self {
            registry: Arc::new(registry),
            classifier: ErrorClassifier::new(config.debug),
            config,
        }
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle a raw JSON body holding one envelope or an array of them.
    pub async fn process_batch(&self, ctx: &RequestContext, body: &[u8]) -> BatchReply {
        let parsed: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                warn!("Malformed request body ({}): {e}", ctx.request_id);
                return BatchReply::malformed(e.to_string());
            }
        };

        let calls = match parsed {
            Value::Array(items) => items,
            single => vec![single],
        };
        debug!("Dispatching batch of {} calls ({})", calls.len(), ctx.request_id);

        let responses = if self.config.concurrent_batches {
            join_all(calls.into_iter().map(|call| self.dispatch_call(ctx, call))).await
        } else {
            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                responses.push(self.dispatch_call(ctx, call).await);
            }
            responses
        };

        BatchReply::from_responses(responses)
    }

    /// Handle a form submission. The method receives only the context; its
    /// fields and files are available through [`RequestContext::form`].
    pub async fn process_form(&self, ctx: &RequestContext, request: FormRequest) -> FormReply {
        let FormRequest {
            action,
            method,
            call_type,
            upload,
            tid,
            fields,
        } = request;
        let tid = Value::String(tid);
        let ctx = ctx.clone().with_form(fields);

        debug!("Dispatching form call {action}.{method} (upload: {upload}, {})", ctx.request_id);

        let outcome = match self.registry.resolve(&action, &method) {
            Ok(target) => target.invoke(ctx, Vec::new()).await.map_err(DispatchError::from),
            Err(e) => Err(e),
        };

        let record = match &outcome {
            Ok(result) => DirectResponse::result(
                call_type.clone(),
                tid.clone(),
                action.clone(),
                method.clone(),
                result.clone(),
            ),
            Err(err) => self
                .classifier
                .classify(tid.clone(), &action, &method, err, &self.config.form_error)
                .into(),
        };

        if !upload {
            return FormReply::Json(record);
        }

        // Upload clients have historically been sent `success: true` whatever
        // happened; the strict mode reports the failure instead.
        let (result, success) = match (outcome, record) {
            (Ok(result), _) => (result, true),
            (Err(_), record) if self.config.upload_reports_failure => {
                (serde_json::to_value(&record).unwrap_or_default(), false)
            }
            (Err(_), _) => (Value::Null, true),
        };

        FormReply::Upload(UploadRecord {
            call_type,
            tid,
            action,
            method,
            result,
            success,
        })
    }

    /// Data form of the API descriptor.
    pub fn api_descriptor(&self, url: &str) -> ApiDescriptor {
        api::build_descriptor(&self.registry, url)
    }

    /// Script form of the API descriptor.
    pub fn api_script(&self, url: &str) -> Result<String, serde_json::Error> {
        api::render_script(&self.registry, url, &self.config.provider)
    }

    /// Decode and run one batch element; never fails.
    async fn dispatch_call(&self, ctx: &RequestContext, raw: Value) -> DirectResponse {
        let tid = raw.get("tid").cloned().unwrap_or(Value::Null);
        let call: DirectRequest = match serde_json::from_value(raw) {
            Ok(call) => call,
            Err(e) => {
                warn!("Malformed call in batch ({}): {e}", ctx.request_id);
                let err = DispatchError::MalformedRequest(e.to_string());
                return ExceptionRecord::protocol(tid, &err).into();
            }
        };

        match self.execute(ctx, &call).await {
            Ok(result) => DirectResponse::result(
                call.call_type,
                call.tid,
                call.action,
                call.method,
                result,
            ),
            Err(err) => {
                if !err.is_invocation() {
                    debug!("Call {}.{} rejected: {err}", call.action, call.method);
                }
                self.classifier
                    .classify(call.tid, &call.action, &call.method, &err, &self.config.generic_error)
                    .into()
            }
        }
    }

    async fn execute(&self, ctx: &RequestContext, call: &DirectRequest) -> Result<Value, DispatchError> {
        let target = self.registry.resolve(&call.action, &call.method)?;
        let args = bind_arguments(target.params(), call.positional_args());

        if args.len() != target.param_count() {
            return Err(DispatchError::ArityMismatch {
                expected: target.param_count(),
                got: args.len(),
            });
        }

        Ok(target.invoke(ctx.clone(), args).await?)
    }
}

/// Apply named-argument sugar.
///
/// When the method takes parameters and the call sent exactly one object,
/// the object is unpacked into positional order if it names every
/// parameter. Otherwise the arguments are returned untouched and arity
/// checking decides.
fn bind_arguments(params: &[String], args: Vec<Value>) -> Vec<Value> {
    if params.is_empty() || args.len() != 1 {
        return args;
    }
    let Some(Value::Object(named)) = args.first() else {
        return args;
    };

    let bound: Option<Vec<Value>> = params
        .iter()
        .map(|param| named.get(param).cloned())
        .collect();

    bound.unwrap_or(args)
}

impl RequestHandler for DirectServer {
    async fn handle_batch(&self, ctx: RequestContext, body: Bytes) -> BatchReply {
        self.process_batch(&ctx, &body).await
    }

    async fn handle_form(&self, ctx: RequestContext, request: FormRequest) -> FormReply {
        self.process_form(&ctx, request).await
    }

    fn api_descriptor(&self, url: &str) -> ApiDescriptor {
        DirectServer::api_descriptor(self, url)
    }

    fn api_script(&self, url: &str) -> Result<String, serde_json::Error> {
        DirectServer::api_script(self, url)
    }
}
