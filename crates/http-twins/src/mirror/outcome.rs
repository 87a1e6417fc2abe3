//! Per-destination dispatch outcomes.

use std::fmt;
use std::time::Duration;

use super::error::MirrorError;
use crate::stats::MirrorStats;

/// Which kind of destination a dispatch unit served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Local,
    Remote,
    Fallback,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DestinationKind::Local => "local",
            DestinationKind::Remote => "remote",
            DestinationKind::Fallback => "fallback",
        })
    }
}

/// Result of mirroring one request to one destination.
///
/// Outcomes are logged and counted, never handed back to the caller.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub kind: DestinationKind,
    pub identifier: String,
    pub succeeded: bool,
    pub error_detail: Option<String>,
    pub latency: Duration,
}

impl DispatchOutcome {
    pub fn success(kind: DestinationKind, identifier: impl Into<String>, latency: Duration) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            succeeded: true,
            error_detail: None,
            latency,
        }
    }

    pub fn failure(
        kind: DestinationKind,
        identifier: impl Into<String>,
        error: &MirrorError,
        latency: Duration,
    ) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            succeeded: false,
            error_detail: Some(error.to_string()),
            latency,
        }
    }

    /// Count the outcome and write it to the log.
    pub fn emit(&self, stats: &MirrorStats) {
        stats.record_outcome(self);

        let latency_ms = self.latency.as_millis() as u64;
        if self.succeeded {
            tracing::info!(
                kind = %self.kind,
                destination = %self.identifier,
                latency_ms = latency_ms,
                "Mirror dispatch complete"
            );
        } else {
            tracing::warn!(
                kind = %self.kind,
                destination = %self.identifier,
                latency_ms = latency_ms,
                error = self.error_detail.as_deref().unwrap_or("unknown"),
                "Mirror dispatch failed"
            );
        }
    }
}
