//! Span builder helpers for mirror instrumentation.

/// Create a span covering one fan-out of an inbound request.
///
/// Usage: `let span = fanout_span!(correlation_id, method, uri);`
///
/// `destinations` is recorded once the snapshot has been taken and the
/// number of scheduled dispatch units is known.
#[macro_export]
macro_rules! fanout_span {
    ($correlation_id:expr, $method:expr, $uri:expr) => {
        tracing::info_span!(
            "mirror_fanout",
            correlation_id = %$correlation_id,
            method = %$method,
            uri = %$uri,
            body_bytes = tracing::field::Empty,
            destinations = tracing::field::Empty,
        )
    };
}

/// Create a span for a single dispatch unit (local handler, remote URL, or
/// the default fallback).
#[macro_export]
macro_rules! dispatch_span {
    ($correlation_id:expr, $kind:expr, $destination:expr) => {
        tracing::info_span!(
            "mirror_dispatch",
            correlation_id = %$correlation_id,
            kind = %$kind,
            destination = %$destination,
            latency_ms = tracing::field::Empty,
            status = tracing::field::Empty,
        )
    };
}
