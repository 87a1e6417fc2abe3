//! Request mirroring: snapshot, activation, fan-out and dispatch.
//!
//! A [`MirrorDirective`] names the destinations for one operation. The
//! [`MirrorCoordinator`] captures the inbound request once and sends a copy
//! to every destination on its own task. Nothing a destination does can
//! delay, fail or alter the primary response.

pub mod activation;
pub mod coordinator;
pub mod directive;
pub mod error;
pub mod fallback;
pub mod intercept;
pub mod local;
pub mod outcome;
pub mod remote;
pub mod sender;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use activation::{ActivationResolver, Properties, PropertySource};
pub use coordinator::MirrorCoordinator;
pub use directive::{Activation, DirectiveTable, MirrorDirective, RouteDirective};
pub use error::{MirrorError, SnapshotError};
pub use fallback::DefaultFallbackHandler;
pub use intercept::{mirror_requests, MirrorLayerState};
pub use local::LocalDispatcher;
pub use outcome::{DestinationKind, DispatchOutcome};
pub use remote::{HttpSender, RemoteDispatcher};
pub use sender::{RemoteSender, SenderRegistry};
pub use snapshot::{Capture, RequestSnapshot};
