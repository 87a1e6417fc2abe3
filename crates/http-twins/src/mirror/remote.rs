//! Dispatch to remote HTTP endpoints.
//!
//! With the default sender each remote destination receives the snapshot's
//! method, end-to-end headers and body unchanged. The response status decides
//! the outcome; the response body is drained and discarded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;

use super::error::MirrorError;
use super::outcome::{DestinationKind, DispatchOutcome};
use super::sender::{RemoteSender, SenderRegistry};
use super::snapshot::RequestSnapshot;

/// Connection-scoped headers that are not copied to mirrored requests.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
];

/// Resolves the sender for a destination and records the outcome.
#[derive(Clone)]
pub struct RemoteDispatcher {
    senders: Arc<SenderRegistry>,
    timeout: Duration,
}

impl RemoteDispatcher {
    pub fn new(senders: Arc<SenderRegistry>, timeout: Duration) -> Self {
        Self { senders, timeout }
    }

    /// Mirror `snapshot` to `url` through the sender named `sender`, or the
    /// default one. Never fails: every error becomes a failed outcome.
    pub async fn dispatch(
        &self,
        url: &str,
        sender: Option<&str>,
        snapshot: &RequestSnapshot,
    ) -> DispatchOutcome {
        let start = Instant::now();
        let result = self.send(url, sender, snapshot).await;
        let latency = start.elapsed();

        match result {
            Ok(()) => DispatchOutcome::success(DestinationKind::Remote, url, latency),
            Err(e) => DispatchOutcome::failure(DestinationKind::Remote, url, &e, latency),
        }
    }

    async fn send(
        &self,
        url: &str,
        sender: Option<&str>,
        snapshot: &RequestSnapshot,
    ) -> Result<(), MirrorError> {
        let transport = self
            .senders
            .resolve(sender)
            .ok_or_else(|| MirrorError::RemoteSenderNotFound(sender.unwrap_or(SenderRegistry::DEFAULT).to_string()))?;

        tokio::time::timeout(self.timeout, transport.send(url, snapshot))
            .await
            .map_err(|_| MirrorError::DispatchTimeout(self.timeout))?
    }
}

/// Default sender: forwards the snapshot's method, end-to-end headers and
/// body through a shared HTTP client.
#[derive(Clone)]
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteSender for HttpSender {
    async fn send(&self, url: &str, snapshot: &RequestSnapshot) -> Result<(), MirrorError> {
        let target = reqwest::Url::parse(url).map_err(|e| MirrorError::invalid_url(url, e))?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(MirrorError::invalid_url(url, "scheme must be http or https"));
        }

        let response = self
            .client
            .request(snapshot.method().clone(), target)
            .headers(end_to_end_headers(snapshot.headers()))
            .body(snapshot.body().clone())
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());
        // Drain so the connection can go back to the pool.
        let _ = response.bytes().await;

        if !status.is_success() {
            return Err(MirrorError::RemoteStatus(status));
        }
        Ok(())
    }
}

/// Copy every header except hop-by-hop ones, keeping duplicate values in order.
fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
