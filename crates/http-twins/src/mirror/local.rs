//! Dispatch to in-process handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::MirrorError;
use super::outcome::{DestinationKind, DispatchOutcome};
use super::snapshot::RequestSnapshot;
use crate::handlers::HandlerRegistry;

/// Resolves local destination names and runs their handlers.
#[derive(Clone)]
pub struct LocalDispatcher {
    registry: Arc<HandlerRegistry>,
    timeout: Duration,
}

impl LocalDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Run the handler registered as `name`. Never fails: a missing handler,
    /// a handler error, a panic or a timeout all become a failed outcome.
    pub async fn dispatch(&self, name: &str, snapshot: Arc<RequestSnapshot>) -> DispatchOutcome {
        let start = Instant::now();
        let result = self.invoke(name, snapshot).await;
        let latency = start.elapsed();

        match result {
            Ok(()) => DispatchOutcome::success(DestinationKind::Local, name, latency),
            Err(e) => DispatchOutcome::failure(DestinationKind::Local, name, &e, latency),
        }
    }

    async fn invoke(&self, name: &str, snapshot: Arc<RequestSnapshot>) -> Result<(), MirrorError> {
        let handler = self
            .registry
            .resolve(name)
            .ok_or(MirrorError::LocalHandlerNotFound)?;

        // Own task so a panic surfaces as a JoinError instead of unwinding here.
        let task = tokio::spawn(async move { handler.process(&snapshot).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(MirrorError::LocalHandlerFailure(e)),
            Ok(Err(join)) if join.is_panic() => Err(MirrorError::LocalHandlerPanic),
            Ok(Err(join)) => Err(MirrorError::LocalHandlerFailure(join.into())),
            Err(_) => {
                abort.abort();
                Err(MirrorError::DispatchTimeout(self.timeout))
            }
        }
    }
}
