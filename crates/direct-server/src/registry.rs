//! MethodRegistry: callable methods keyed by (namespace, name).
//!
//! The registry is filled at startup and then handed to
//! [`DirectServer`](crate::DirectServer), which freezes it behind an `Arc`.
//! There is no way to register after that point, so request-time lookups
//! need no locking.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use direct_protocol::{DispatchError, MethodError, MethodResult, RequestContext};
use futures_util::FutureExt;
use serde_json::{Map, Value};
use tracing::debug;

/// Trait implemented by everything that can be registered as a method.
///
/// `args` holds the positional arguments after named-argument binding; its
/// length always equals the declared parameter count. Any
/// `Fn(RequestContext, Vec<Value>) -> impl Future<Output = MethodResult>`
/// closure implements this trait.
pub trait DirectMethod: Send + Sync + 'static {
    fn call(
        &self,
        ctx: RequestContext,
        args: Vec<Value>,
    ) -> impl Future<Output = MethodResult> + Send;
}

impl<F, Fut> DirectMethod for F
where
    F: Fn(RequestContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MethodResult> + Send,
{
    fn call(
        &self,
        ctx: RequestContext,
        args: Vec<Value>,
    ) -> impl Future<Output = MethodResult> + Send {
        self(ctx, args)
    }
}

/// Object-safe wrapper for the DirectMethod trait.
trait MethodDyn: Send + Sync {
    fn call_dyn(
        &self,
        ctx: RequestContext,
        args: Vec<Value>,
    ) -> Pin<Box<dyn Future<Output = MethodResult> + Send + '_>>;
}

impl<T: DirectMethod> MethodDyn for T {
    fn call_dyn(
        &self,
        ctx: RequestContext,
        args: Vec<Value>,
    ) -> Pin<Box<dyn Future<Output = MethodResult> + Send + '_>> {
        Box::pin(self.call(ctx, args))
    }
}

/// Declaration of a method's protocol-visible signature.
///
/// `params` lists the positional parameters after the injected context.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    name: String,
    params: Vec<String>,
    flags: Map<String, Value>,
}

impl MethodSpec {
    pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            flags: Map::new(),
        }
    }

    /// Attach a capability flag, e.g. `formHandler: true`.
    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    pub fn with_flags(mut self, flags: Map<String, Value>) -> Self {
        self.flags.extend(flags);
        self
    }
}

/// A registered method with its cached signature.
pub struct RegisteredMethod {
    namespace: String,
    name: String,
    params: Vec<String>,
    flags: Map<String, Value>,
    handler: Arc<dyn MethodDyn>,
}

impl RegisteredMethod {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn flags(&self) -> &Map<String, Value> {
        &self.flags
    }

    /// Run the method. A panic inside the method becomes an internal
    /// [`MethodError`].
    pub async fn invoke(&self, ctx: RequestContext, args: Vec<Value>) -> MethodResult {
        AssertUnwindSafe(self.handler.call_dyn(ctx, args))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(MethodError::from_panic(payload)))
    }
}

impl std::fmt::Debug for RegisteredMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredMethod")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Registry of callable methods.
///
/// Namespaces and names are compared exactly. Iteration is sorted by
/// namespace then name, so descriptors are reproducible.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    actions: BTreeMap<String, BTreeMap<String, RegisteredMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method` under `namespace`. Re-registering the same pair
    /// replaces the previous entry.
    pub fn register<M: DirectMethod>(
        &mut self,
        namespace: impl Into<String>,
        spec: MethodSpec,
        method: M,
    ) -> &mut Self {
        let namespace = namespace.into();
        debug!(
            "Registering method: {}.{} ({} params)",
            namespace,
            spec.name,
            spec.params.len()
        );

        let entry = RegisteredMethod {
            namespace: namespace.clone(),
            name: spec.name.clone(),
            params: spec.params,
            flags: spec.flags,
            handler: Arc::new(method),
        };
        self.actions
            .entry(namespace)
            .or_default()
            .insert(spec.name, entry);
        self
    }

    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&RegisteredMethod> {
        self.actions.get(namespace)?.get(name)
    }

    /// Like [`lookup`](Self::lookup), but says which half of the pair is unknown.
    pub fn resolve(&self, namespace: &str, name: &str) -> Result<&RegisteredMethod, DispatchError> {
        let methods = self
            .actions
            .get(namespace)
            .ok_or_else(|| DispatchError::UnknownAction(namespace.to_string()))?;
        methods
            .get(name)
            .ok_or_else(|| DispatchError::UnknownMethod(name.to_string()))
    }

    pub fn has_action(&self, namespace: &str) -> bool {
        self.actions.contains_key(namespace)
    }

    /// All registered methods, grouped by namespace.
    pub fn methods(&self) -> impl Iterator<Item = &RegisteredMethod> {
        self.actions.values().flat_map(|methods| methods.values())
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
