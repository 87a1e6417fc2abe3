//! Default destination for directives that name no destinations.

use std::time::Instant;

use super::outcome::{DestinationKind, DispatchOutcome};
use super::snapshot::RequestSnapshot;

/// Logs the mirrored request and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFallbackHandler;

impl DefaultFallbackHandler {
    pub const IDENTIFIER: &'static str = "default";

    pub fn handle(&self, snapshot: &RequestSnapshot) -> DispatchOutcome {
        let start = Instant::now();
        let body = snapshot.body_text();
        tracing::info!(
            method = %snapshot.method(),
            uri = %snapshot.uri(),
            headers = %snapshot.describe_headers(),
            body = if body.is_empty() { "[no body]" } else { &*body },
            "Mirrored request with no configured destinations"
        );
        DispatchOutcome::success(DestinationKind::Fallback, Self::IDENTIFIER, start.elapsed())
    }
}
