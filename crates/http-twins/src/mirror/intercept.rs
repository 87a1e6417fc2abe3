//! Interception hook: axum middleware that mirrors requests before the
//! primary handler runs.
//!
//! Install with `route_layer` so the matched route pattern is available:
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/books", post(create_book))
//!     .route_layer(axum::middleware::from_fn_with_state(mirror_state, mirror_requests));
//! ```

use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::coordinator::MirrorCoordinator;
use super::directive::DirectiveTable;

/// State for [`mirror_requests`].
#[derive(Clone)]
pub struct MirrorLayerState {
    pub coordinator: MirrorCoordinator,
    pub directives: Arc<DirectiveTable>,
}

/// Look up the directive for the matched route and fan the request out.
///
/// Routes without a directive pass straight through. The primary handler
/// always runs, whatever happened while mirroring.
pub async fn mirror_requests(
    State(state): State<MirrorLayerState>,
    request: Request,
    next: Next,
) -> Response {
    let directive = {
        let path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str)
            .unwrap_or_else(|| request.uri().path());
        state.directives.resolve(request.method(), path)
    };

    let Some(directive) = directive else {
        return next.run(request).await;
    };

    let request = state.coordinator.fanout(&directive, request).await;
    next.run(request).await
}
