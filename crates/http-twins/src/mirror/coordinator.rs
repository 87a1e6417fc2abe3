//! Fan-out orchestration.
//!
//! `fanout` is called on the request path, before the primary handler. It
//! resolves activation, captures the request once and schedules one tracked
//! task per destination, then returns without waiting for any of them.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::header::CONTENT_LENGTH;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

use super::activation::{ActivationResolver, PropertySource};
use super::directive::MirrorDirective;
use super::fallback::DefaultFallbackHandler;
use super::local::LocalDispatcher;
use super::outcome::DestinationKind;
use super::remote::RemoteDispatcher;
use super::sender::SenderRegistry;
use super::snapshot::{Capture, RequestSnapshot};
use crate::config::MirrorConfig;
use crate::handlers::HandlerRegistry;
use crate::stats::MirrorStats;

enum Destination {
    Local(String),
    Remote { url: String, sender: Option<String> },
    Fallback,
}

impl Destination {
    fn kind(&self) -> DestinationKind {
        match self {
            Destination::Local(_) => DestinationKind::Local,
            Destination::Remote { .. } => DestinationKind::Remote,
            Destination::Fallback => DestinationKind::Fallback,
        }
    }

    fn identifier(&self) -> &str {
        match self {
            Destination::Local(name) => name,
            Destination::Remote { url, .. } => url,
            Destination::Fallback => DefaultFallbackHandler::IDENTIFIER,
        }
    }
}

/// Mirrors requests to the destinations named by a directive.
///
/// Cheap to clone; clones share the dispatch pool, task tracker and stats.
#[derive(Clone)]
pub struct MirrorCoordinator {
    activation: ActivationResolver,
    local: LocalDispatcher,
    remote: RemoteDispatcher,
    fallback: DefaultFallbackHandler,
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    stats: MirrorStats,
    max_body_bytes: usize,
}

impl MirrorCoordinator {
    /// `senders` and `handlers` are shared by every dispatch unit and never
    /// mutated here.
    pub fn new(
        config: &MirrorConfig,
        senders: Arc<SenderRegistry>,
        handlers: Arc<HandlerRegistry>,
        properties: Arc<dyn PropertySource>,
        stats: MirrorStats,
    ) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self {
            activation: ActivationResolver::new(properties),
            local: LocalDispatcher::new(handlers, timeout),
            remote: RemoteDispatcher::new(senders, timeout),
            fallback: DefaultFallbackHandler,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            tracker: TaskTracker::new(),
            stats,
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    /// Mirror `request` according to `directive` and hand it back for the
    /// primary handler.
    ///
    /// Inactive directives and oversized bodies return the request without
    /// mirroring. Otherwise the body is buffered once and the returned
    /// request replays it. Nothing a destination does can surface here, and
    /// a body that cannot be read reaches the primary handler with the same
    /// transport error it would have seen without mirroring.
    pub async fn fanout(&self, directive: &MirrorDirective, request: Request) -> Request {
        if !self.activation.resolve(&directive.activation) {
            self.stats.inc_inactive();
            tracing::debug!(
                method = %request.method(),
                uri = %request.uri(),
                "Mirroring inactive, skipping"
            );
            return request;
        }

        if let Some(length) = declared_length(&request) {
            if length > self.max_body_bytes {
                self.skip_oversized(&request, length);
                return request;
            }
        }

        match RequestSnapshot::capture(request, self.max_body_bytes).await {
            Capture::Complete { snapshot, request } => {
                self.dispatch(directive, Arc::new(snapshot));
                request
            }
            Capture::Oversized { request, buffered } => {
                self.skip_oversized(&request, buffered);
                request
            }
            Capture::Failed { request, error } => {
                self.stats.inc_snapshot_failures();
                tracing::warn!(
                    error = %error,
                    method = %request.method(),
                    uri = %request.uri(),
                    "Failed to capture request, mirroring abandoned"
                );
                request
            }
        }
    }

    /// Schedule one unit per destination for an already captured snapshot
    /// and return the number of units scheduled. Does not check activation.
    pub fn dispatch(&self, directive: &MirrorDirective, snapshot: Arc<RequestSnapshot>) -> usize {
        let correlation_id = Uuid::new_v4().to_string();
        let span = twins_tracing::fanout_span!(correlation_id, snapshot.method(), snapshot.uri());
        span.record("body_bytes", snapshot.body().len() as u64);
        self.stats.inc_fanouts();

        let destinations: Vec<Destination> = if directive.has_destinations() {
            directive
                .local_destinations
                .iter()
                .cloned()
                .map(Destination::Local)
                .chain(directive.remote_destinations.iter().map(|url| Destination::Remote {
                    url: url.clone(),
                    sender: directive.remote_sender.clone(),
                }))
                .collect()
        } else {
            vec![Destination::Fallback]
        };

        let scheduled = destinations.len();
        span.record("destinations", scheduled as u64);

        for destination in destinations {
            self.spawn_unit(&span, &correlation_id, destination, snapshot.clone());
        }
        scheduled
    }

    fn spawn_unit(
        &self,
        parent: &tracing::Span,
        correlation_id: &str,
        destination: Destination,
        snapshot: Arc<RequestSnapshot>,
    ) {
        let span = parent.in_scope(|| {
            twins_tracing::dispatch_span!(correlation_id, destination.kind(), destination.identifier())
        });
        let this = self.clone();
        self.stats.inc_dispatched();

        self.tracker.spawn(
            async move {
                // Queue for a slot inside the unit so the caller never waits.
                let Ok(_permit) = this.semaphore.clone().acquire_owned().await else {
                    return;
                };

                let outcome = match &destination {
                    Destination::Local(name) => this.local.dispatch(name, snapshot).await,
                    Destination::Remote { url, sender } => {
                        this.remote.dispatch(url, sender.as_deref(), &snapshot).await
                    }
                    Destination::Fallback => this.fallback.handle(&snapshot),
                };

                tracing::Span::current().record("latency_ms", outcome.latency.as_millis() as u64);
                outcome.emit(&this.stats);
            }
            .instrument(span),
        );
    }

    fn skip_oversized(&self, request: &Request, length: usize) {
        self.stats.inc_oversized();
        tracing::warn!(
            method = %request.method(),
            uri = %request.uri(),
            bytes = length,
            max = self.max_body_bytes,
            "Request body too large to mirror, skipping"
        );
    }

    /// Number of dispatch units still running or queued.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait up to `grace` for in-flight units. Returns false if some were
    /// still running when the grace period ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
        if !drained {
            tracing::warn!(
                in_flight = self.tracker.len(),
                grace_secs = grace.as_secs(),
                "Mirror units still running after drain period"
            );
        }
        self.tracker.reopen();
        drained
    }
}

fn declared_length(request: &Request) -> Option<usize> {
    request
        .headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
