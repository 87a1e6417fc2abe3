//! Test doubles shared by the mirror tests.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use tracing_subscriber::fmt::MakeWriter;

use super::error::MirrorError;
use super::sender::RemoteSender;
use super::snapshot::RequestSnapshot;
use crate::handlers::RequestHandler;

/// Remembers every snapshot it is given.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    seen: Arc<Mutex<Vec<RequestSnapshot>>>,
}

impl Recorder {
    pub(crate) fn seen(&self) -> Vec<RequestSnapshot> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestHandler for Recorder {
    async fn process(&self, snapshot: &RequestSnapshot) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

pub(crate) struct Failing;

#[async_trait]
impl RequestHandler for Failing {
    async fn process(&self, _snapshot: &RequestSnapshot) -> anyhow::Result<()> {
        anyhow::bail!("ledger unavailable")
    }
}

pub(crate) struct Panicking;

#[async_trait]
impl RequestHandler for Panicking {
    async fn process(&self, _snapshot: &RequestSnapshot) -> anyhow::Result<()> {
        panic!("handler bug")
    }
}

/// Never completes.
pub(crate) struct Stalled;

#[async_trait]
impl RequestHandler for Stalled {
    async fn process(&self, _snapshot: &RequestSnapshot) -> anyhow::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Remote sender that records `(url, snapshot)` pairs instead of sending.
#[derive(Clone, Default)]
pub(crate) struct SenderLog {
    sent: Arc<Mutex<Vec<(String, RequestSnapshot)>>>,
}

impl SenderLog {
    pub(crate) fn sent(&self) -> Vec<(String, RequestSnapshot)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSender for SenderLog {
    async fn send(&self, url: &str, snapshot: &RequestSnapshot) -> Result<(), MirrorError> {
        self.sent.lock().unwrap().push((url.to_string(), snapshot.clone()));
        Ok(())
    }
}

/// Remote sender that never completes.
pub(crate) struct StalledSender;

#[async_trait]
impl RemoteSender for StalledSender {
    async fn send(&self, _url: &str, _snapshot: &RequestSnapshot) -> Result<(), MirrorError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Request body that yields one chunk, then a transport error.
#[derive(Default)]
pub(crate) struct BrokenStream {
    sent_first: bool,
}

impl futures_core::Stream for BrokenStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.sent_first {
            Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer reset",
            ))))
        } else {
            self.sent_first = true;
            Poll::Ready(Some(Ok(Bytes::from_static(b"{\"id\":"))))
        }
    }
}

/// Streamed body of fixed-size chunks, each filled with its index so
/// reordering shows up.
pub(crate) struct Chunks {
    sent: usize,
    count: Option<usize>,
    size: usize,
}

impl Chunks {
    pub(crate) fn finite(count: usize, size: usize) -> Self {
        Self {
            sent: 0,
            count: Some(count),
            size,
        }
    }

    pub(crate) fn endless(size: usize) -> Self {
        Self {
            sent: 0,
            count: None,
            size,
        }
    }

    /// Concatenation of what `Chunks::finite(count, size)` yields.
    pub(crate) fn expected(count: usize, size: usize) -> Vec<u8> {
        (0..count).flat_map(|i| vec![(i % 251) as u8; size]).collect()
    }
}

impl futures_core::Stream for Chunks {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.count.is_some_and(|count| self.sent >= count) {
            return Poll::Ready(None);
        }
        let chunk = Bytes::from(vec![(self.sent % 251) as u8; self.size]);
        self.sent += 1;
        Poll::Ready(Some(Ok(chunk)))
    }
}

/// In-memory JSON log sink for asserting on emitted events.
#[derive(Clone, Default)]
pub(crate) struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Route this thread's events here until the guard drops.
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn events(&self) -> Vec<serde_json::Value> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub(crate) fn events_with_message(&self, message: &str) -> Vec<serde_json::Value> {
        self.events()
            .into_iter()
            .filter(|event| event["fields"]["message"] == message)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Local HTTP server that records every request and answers with a fixed status.
pub(crate) struct CaptureServer {
    addr: SocketAddr,
    captured: Arc<tokio::sync::Mutex<Vec<CapturedRequest>>>,
}

impl CaptureServer {
    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub(crate) async fn received(&self) -> Vec<CapturedRequest> {
        self.captured.lock().await.clone()
    }
}

pub(crate) async fn spawn_capture_server(status: StatusCode) -> CaptureServer {
    let captured: Arc<tokio::sync::Mutex<Vec<CapturedRequest>>> = Arc::default();
    let sink = captured.clone();

    let app = axum::Router::new().fallback(move |request: Request| {
        let sink = sink.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX)
                .await
                .unwrap_or_default();
            sink.lock().await.push(CapturedRequest {
                method: parts.method,
                path: parts.uri.path().to_string(),
                headers: parts.headers,
                body,
            });
            status
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, app).into_future());

    CaptureServer { addr, captured }
}
