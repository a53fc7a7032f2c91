//! The worker's method table: the dynamic-dispatch-by-name mechanism the
//! request frame's `method` field selects into.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

/// An error raised by a method body. `kind` becomes the response frame's
/// `exc`; `message` becomes `info`.
#[derive(Debug, Clone)]
pub struct MethodError {
    pub kind: String,
    pub message: String,
}

impl MethodError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MethodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for MethodError {}

type MethodFn = dyn Fn(Value, Value) -> BoxFuture<'static, Result<Value, MethodError>> + Send + Sync;

/// A fixed registry of named methods, built once at worker startup. Adding
/// or removing a method requires a respawn.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<&'static str, Arc<MethodFn>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method under `name`. `args` is the request's positional
    /// arguments as a JSON array; `kw` is its keyword arguments as a JSON
    /// object.
    pub fn register<F, Fut>(&mut self, name: &'static str, method: F)
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, MethodError>> + Send + 'static,
    {
        self.methods
            .insert(name, Arc::new(move |args, kw| Box::pin(method(args, kw))));
    }

    pub fn get(&self, name: &str) -> Option<Arc<MethodFn>> {
        self.methods.get(name).cloned()
    }
}
