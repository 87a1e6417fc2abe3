//! Mirror error taxonomy.
//!
//! None of these reach the primary response: a [`SnapshotError`] abandons the
//! fan-out for one invocation, and a [`MirrorError`] is recorded on the
//! outcome of the single destination it happened on.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Failure while buffering the inbound request.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The transport failed while the body was being streamed in. The same
    /// error is replayed to the primary handler.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] Arc<axum::Error>),
}

/// Why one mirror destination failed.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("handler not registered")]
    LocalHandlerNotFound,

    #[error("handler failed: {0:#}")]
    LocalHandlerFailure(anyhow::Error),

    #[error("handler panicked")]
    LocalHandlerPanic,

    #[error("timed out after {0:?}")]
    DispatchTimeout(Duration),

    #[error("invalid destination URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("transport error: {0}")]
    RemoteTransport(#[from] reqwest::Error),

    #[error("destination responded with status {0}")]
    RemoteStatus(StatusCode),

    #[error("remote sender {0:?} not registered")]
    RemoteSenderNotFound(String),

    /// Raised by custom [`RemoteSender`](super::RemoteSender) implementations.
    #[error("remote sender failed: {0:#}")]
    RemoteSenderFailure(anyhow::Error),
}

impl MirrorError {
    pub(crate) fn invalid_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
