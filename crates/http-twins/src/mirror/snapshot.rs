//! Replayable request capture.
//!
//! The inbound body is a single-read stream. Capturing buffers it once into
//! `Bytes`, hands the primary handler a request whose body replays those
//! bytes, and keeps an immutable copy every mirror destination can read.
//!
//! Buffering stops as soon as the body outgrows the mirror limit or the
//! transport fails. In both cases the primary handler still gets a body that
//! yields exactly what the original stream would have yielded.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, BodyDataStream};
use axum::extract::Request;
use axum::http::{HeaderMap, Method, Uri};
use bytes::{Bytes, BytesMut};
use futures_core::Stream;

use super::error::SnapshotError;

/// Header values replaced with a marker when a request is written to logs.
const REDACTED_HEADERS: &[&str] = &["authorization", "proxy-authorization", "cookie"];

/// Immutable capture of an inbound request.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

/// What [`RequestSnapshot::capture`] produced. Every variant carries the
/// request for the primary handler.
#[derive(Debug)]
pub enum Capture {
    /// The whole body fit under the limit.
    Complete {
        snapshot: RequestSnapshot,
        request: Request,
    },
    /// The body outgrew the limit after `buffered` bytes. The request
    /// replays those bytes, then the unread rest of the stream.
    Oversized { request: Request, buffered: usize },
    /// The transport failed mid-body. The request replays the bytes read so
    /// far, then the same error.
    Failed {
        request: Request,
        error: SnapshotError,
    },
}

impl RequestSnapshot {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri,
            headers,
            body: body.into(),
        }
    }

    /// Buffer at most `limit` bytes of `request`.
    ///
    /// The body stream is read exactly once; memory held is bounded by
    /// `limit` plus one chunk.
    pub async fn capture(request: Request, limit: usize) -> Capture {
        let (parts, body) = request.into_parts();
        let mut stream = body.into_data_stream();
        let mut buffered = BytesMut::new();

        loop {
            match poll_fn(|cx| Pin::new(&mut stream).poll_next(cx)).await {
                None => break,
                Some(Ok(chunk)) => {
                    buffered.extend_from_slice(&chunk);
                    if buffered.len() > limit {
                        let size = buffered.len();
                        let body = Replay::body(buffered.freeze(), Remainder::Stream(stream));
                        return Capture::Oversized {
                            request: Request::from_parts(parts, body),
                            buffered: size,
                        };
                    }
                }
                Some(Err(e)) => {
                    let error = Arc::new(e);
                    let body = Replay::body(buffered.freeze(), Remainder::Failed(Some(error.clone())));
                    return Capture::Failed {
                        request: Request::from_parts(parts, body),
                        error: SnapshotError::BodyRead(error),
                    };
                }
            }
        }

        let bytes = buffered.freeze();
        let snapshot = Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body: bytes.clone(),
        };
        Capture::Complete {
            snapshot,
            request: Request::from_parts(parts, Body::from(bytes)),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes. Cloning the returned `Bytes` is a reference-count bump.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8 with invalid sequences replaced.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// `name: value` lines for logging, credentials redacted.
    pub fn describe_headers(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.headers.iter() {
            if !out.is_empty() {
                out.push('\n');
            }
            if REDACTED_HEADERS.contains(&name.as_str()) {
                let _ = write!(out, "{name}: [redacted]");
            } else {
                let _ = write!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
            }
        }
        out
    }
}

/// Body for the primary handler after a partial read.
struct Replay {
    prefix: Option<Bytes>,
    rest: Remainder,
}

enum Remainder {
    Stream(BodyDataStream),
    Failed(Option<Arc<axum::Error>>),
}

impl Replay {
    fn body(prefix: Bytes, rest: Remainder) -> Body {
        Body::from_stream(Self {
            prefix: Some(prefix),
            rest,
        })
    }
}

impl Stream for Replay {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(prefix) = self.prefix.take() {
            if !prefix.is_empty() {
                return Poll::Ready(Some(Ok(prefix)));
            }
        }
        match &mut self.rest {
            Remainder::Stream(stream) => Pin::new(stream).poll_next(cx),
            Remainder::Failed(error) => Poll::Ready(error.take().map(|e| Err(axum::Error::new(e)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::testing::{BrokenStream, Chunks};

    async fn capture_all(request: Request) -> (RequestSnapshot, Request) {
        match RequestSnapshot::capture(request, usize::MAX).await {
            Capture::Complete { snapshot, request } => (snapshot, request),
            other => panic!("expected a complete capture, got {other:?}"),
        }
    }

    async fn read_body(request: Request) -> Result<Bytes, axum::Error> {
        axum::body::to_bytes(request.into_body(), usize::MAX).await
    }

    #[tokio::test]
    async fn test_capture_preserves_body_for_primary() {
        let request = Request::builder()
            .method("POST")
            .uri("/orders?src=web")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"id":1}"#))
            .unwrap();

        let (snapshot, replay) = capture_all(request).await;

        assert_eq!(snapshot.method(), Method::POST);
        assert_eq!(snapshot.uri(), "/orders?src=web");
        assert_eq!(snapshot.body().as_ref(), br#"{"id":1}"#);

        // The primary handler still sees the full body.
        let primary = read_body(replay).await.unwrap();
        assert_eq!(primary, snapshot.body());

        // And the snapshot stays readable after that.
        assert_eq!(snapshot.body_text(), r#"{"id":1}"#);
        assert_eq!(snapshot.clone().body(), snapshot.body());
    }

    #[tokio::test]
    async fn test_capture_keeps_duplicate_headers_in_order() {
        let request = Request::builder()
            .uri("/x")
            .header("x-trace", "first")
            .header("accept", "*/*")
            .header("x-trace", "second")
            .body(Body::empty())
            .unwrap();

        let (snapshot, _) = capture_all(request).await;

        let traces: Vec<_> = snapshot.headers().get_all("x-trace").iter().collect();
        assert_eq!(traces, ["first", "second"]);
        assert!(snapshot.body().is_empty());
    }

    #[tokio::test]
    async fn test_body_at_limit_is_complete() {
        let request = Request::builder()
            .method("POST")
            .uri("/orders")
            .body(Body::from_stream(Chunks::finite(2, 4)))
            .unwrap();

        match RequestSnapshot::capture(request, 8).await {
            Capture::Complete { snapshot, .. } => assert_eq!(snapshot.body().len(), 8),
            other => panic!("expected a complete capture, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit_stops_buffering() {
        let request = Request::builder()
            .method("POST")
            .uri("/uploads")
            .body(Body::from_stream(Chunks::finite(64, 1024)))
            .unwrap();

        let Capture::Oversized { request, buffered } = RequestSnapshot::capture(request, 4).await
        else {
            panic!("expected an oversized capture");
        };
        // Only the first chunk was read.
        assert_eq!(buffered, 1024);

        // The primary handler still receives every byte, in order.
        let primary = read_body(request).await.unwrap();
        assert_eq!(primary.len(), 64 * 1024);
        assert_eq!(primary, Chunks::expected(64, 1024));
    }

    #[tokio::test]
    async fn test_endless_body_returns_after_limit() {
        let request = Request::builder()
            .method("POST")
            .uri("/uploads")
            .body(Body::from_stream(Chunks::endless(64 * 1024)))
            .unwrap();

        let capture = RequestSnapshot::capture(request, 4).await;
        assert!(matches!(capture, Capture::Oversized { buffered, .. } if buffered == 64 * 1024));
    }

    #[tokio::test]
    async fn test_transport_error_is_replayed_to_primary() {
        let request = Request::builder()
            .method("POST")
            .uri("/orders")
            .body(Body::from_stream(BrokenStream::default()))
            .unwrap();

        let Capture::Failed { request, error } = RequestSnapshot::capture(request, usize::MAX).await
        else {
            panic!("expected a failed capture");
        };
        assert!(matches!(error, SnapshotError::BodyRead(_)));

        let mut replay = request.into_body().into_data_stream();
        let first = poll_fn(|cx| Pin::new(&mut replay).poll_next(cx)).await;
        assert_eq!(first.unwrap().unwrap().as_ref(), b"{\"id\":");
        let second = poll_fn(|cx| Pin::new(&mut replay).poll_next(cx)).await;
        let err = second.unwrap().unwrap_err();
        assert!(err.to_string().contains("peer reset"), "{err}");
        assert!(poll_fn(|cx| Pin::new(&mut replay).poll_next(cx)).await.is_none());
    }

    #[test]
    fn test_describe_headers_redacts_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        headers.insert("x-tenant", "acme".parse().unwrap());
        let snapshot = RequestSnapshot::new(Method::GET, Uri::from_static("/x"), headers, Bytes::new());

        let described = snapshot.describe_headers();
        assert!(described.contains("authorization: [redacted]"));
        assert!(described.contains("x-tenant: acme"));
        assert!(!described.contains("secret"));
    }
}
