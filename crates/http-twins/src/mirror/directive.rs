//! Mirror directives and the per-route directive table.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{bail, Context};
use axum::http::Method;
use serde::Deserialize;

/// Whether mirroring is active for an operation.
///
/// In configuration this is either a TOML boolean or a string such as
/// `"${mirror.books.enabled}"` that is resolved against the property source
/// on every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Activation {
    Literal(bool),
    Deferred(String),
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Literal(true)
    }
}

impl From<bool> for Activation {
    fn from(value: bool) -> Self {
        Activation::Literal(value)
    }
}

impl From<&str> for Activation {
    fn from(expression: &str) -> Self {
        Activation::Deferred(expression.to_string())
    }
}

/// Destinations an operation's requests are mirrored to.
///
/// Both sets empty is valid: the request then goes to the default fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MirrorDirective {
    /// Names resolved through the handler registry.
    #[serde(default, rename = "local")]
    pub local_destinations: BTreeSet<String>,

    /// Absolute URLs that receive a copy of the request.
    #[serde(default, rename = "remote")]
    pub remote_destinations: BTreeSet<String>,

    /// Sender the remote URLs go through; the registry default when unset.
    #[serde(default, alias = "remote_processor")]
    pub remote_sender: Option<String>,

    #[serde(default, rename = "active")]
    pub activation: Activation,
}

impl MirrorDirective {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(mut self, name: impl Into<String>) -> Self {
        self.local_destinations.insert(name.into());
        self
    }

    pub fn remote(mut self, url: impl Into<String>) -> Self {
        self.remote_destinations.insert(url.into());
        self
    }

    pub fn sender(mut self, name: impl Into<String>) -> Self {
        self.remote_sender = Some(name.into());
        self
    }

    pub fn active(mut self, activation: impl Into<Activation>) -> Self {
        self.activation = activation.into();
        self
    }

    pub fn has_destinations(&self) -> bool {
        !self.local_destinations.is_empty() || !self.remote_destinations.is_empty()
    }
}

/// A directive bound to a route, as written in the `[[routes]]` config tables.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDirective {
    pub method: String,
    /// Route pattern as registered with the router (e.g. `/books/{id}`).
    pub path: String,
    #[serde(flatten)]
    pub directive: MirrorDirective,
}

/// Lookup from `(method, route pattern)` to the directive for that operation.
#[derive(Debug, Clone, Default)]
pub struct DirectiveTable {
    routes: HashMap<(Method, String), Arc<MirrorDirective>>,
}

impl DirectiveTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from configuration, rejecting unknown methods,
    /// relative paths and routes declared twice.
    pub fn from_routes(routes: &[RouteDirective]) -> anyhow::Result<Self> {
        let mut table = Self::new();
        for route in routes {
            let method = Method::from_bytes(route.method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method {:?} in mirror route", route.method))?;
            if !route.path.starts_with('/') {
                bail!("mirror route path {:?} must start with '/'", route.path);
            }
            let key = (method, route.path.clone());
            if table.routes.contains_key(&key) {
                bail!("mirror route {} {} declared more than once", key.0, key.1);
            }
            table.routes.insert(key, Arc::new(route.directive.clone()));
        }
        Ok(table)
    }

    pub fn insert(&mut self, method: Method, path: impl Into<String>, directive: MirrorDirective) {
        self.routes.insert((method, path.into()), Arc::new(directive));
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Option<Arc<MirrorDirective>> {
        self.routes.get(&(method.clone(), path.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
