//! Local mirror destinations.
//!
//! A local destination is an in-process [`RequestHandler`] registered under a
//! logical name. Directives refer to handlers by that name; the registry is
//! built at startup and read-only afterwards.

mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::mirror::RequestSnapshot;

pub use builtin::{ReportingAgent, RequestLogger};

/// An in-process consumer of mirrored requests.
///
/// Handlers run on their own task, concurrently with the primary handler and
/// with every other destination. Errors are recorded by the dispatcher and
/// never reach the client.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn process(&self, snapshot: &RequestSnapshot) -> anyhow::Result<()>;
}

/// Name → handler lookup used by the local dispatcher.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `reportingAgent` and `requestLogger`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ReportingAgent::NAME, ReportingAgent);
        registry.register(RequestLogger::NAME, RequestLogger);
        registry
    }

    /// Register a handler. A handler already registered under `name` is replaced.
    pub fn register<H: RequestHandler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        self.register_arc(name, Arc::new(handler));
    }

    pub fn register_arc(&mut self, name: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
