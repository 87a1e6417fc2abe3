//! Pluggable transports for remote destinations.
//!
//! A directive may name the sender its remote URLs go through
//! (`remote_sender = "..."`). Without one, the registry's default sender is
//! used, which forwards the request over HTTP.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::MirrorError;
use super::remote::HttpSender;
use super::snapshot::RequestSnapshot;

/// Delivers one snapshot to one remote URL.
///
/// The dispatcher bounds every call with the mirror timeout and records the
/// result; implementations only report success or the reason for failure.
#[async_trait]
pub trait RemoteSender: Send + Sync {
    async fn send(&self, url: &str, snapshot: &RequestSnapshot) -> Result<(), MirrorError>;
}

/// Name → sender lookup, with a default for directives that name none.
pub struct SenderRegistry {
    default: Arc<dyn RemoteSender>,
    senders: HashMap<String, Arc<dyn RemoteSender>>,
}

impl SenderRegistry {
    /// Name the default sender is also registered under.
    pub const DEFAULT: &'static str = "http";

    pub fn new(default: Arc<dyn RemoteSender>) -> Self {
        let mut senders = HashMap::new();
        senders.insert(Self::DEFAULT.to_string(), default.clone());
        Self { default, senders }
    }

    /// Registry whose default forwards over HTTP through `client`.
    pub fn http(client: reqwest::Client) -> Self {
        Self::new(Arc::new(HttpSender::new(client)))
    }

    /// Register a sender. A sender already registered under `name` is replaced.
    pub fn register<S: RemoteSender + 'static>(&mut self, name: impl Into<String>, sender: S) {
        self.senders.insert(name.into(), Arc::new(sender));
    }

    /// `None` selects the default sender.
    pub fn resolve(&self, name: Option<&str>) -> Option<Arc<dyn RemoteSender>> {
        match name {
            None => Some(self.default.clone()),
            Some(name) => self.senders.get(name).cloned(),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.senders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::testing::SenderLog;

    #[test]
    fn test_default_sender_is_named_http() {
        let registry = SenderRegistry::http(reqwest::Client::new());
        assert!(registry.resolve(None).is_some());
        assert!(registry.resolve(Some("http")).is_some());
        assert!(registry.resolve(Some("kafka")).is_none());
        assert_eq!(registry.names(), vec!["http"]);
    }

    #[test]
    fn test_register_adds_named_sender() {
        let mut registry = SenderRegistry::http(reqwest::Client::new());
        registry.register("audit-bus", SenderLog::default());
        assert_eq!(registry.names(), vec!["audit-bus", "http"]);
        assert!(registry.resolve(Some("audit-bus")).is_some());
    }
}
