use std::borrow::Cow;

use async_trait::async_trait;

use super::RequestHandler;
use crate::mirror::RequestSnapshot;

/// Writes a one-line report of each mirrored request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportingAgent;

impl ReportingAgent {
    pub const NAME: &'static str = "reportingAgent";
}

#[async_trait]
impl RequestHandler for ReportingAgent {
    async fn process(&self, snapshot: &RequestSnapshot) -> anyhow::Result<()> {
        tracing::info!(
            handler = Self::NAME,
            method = %snapshot.method(),
            uri = %snapshot.uri(),
            "Reporting mirrored request"
        );
        Ok(())
    }
}

/// Dumps the full mirrored request: method, URI, headers and body.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl RequestLogger {
    pub const NAME: &'static str = "requestLogger";
}

#[async_trait]
impl RequestHandler for RequestLogger {
    async fn process(&self, snapshot: &RequestSnapshot) -> anyhow::Result<()> {
        let body = if snapshot.body().is_empty() {
            Cow::Borrowed("[no body]")
        } else {
            snapshot.body_text()
        };
        tracing::info!(
            handler = Self::NAME,
            method = %snapshot.method(),
            uri = %snapshot.uri(),
            headers = %snapshot.describe_headers(),
            body = %body,
            "Mirrored request dump"
        );
        Ok(())
    }
}
