//! http-twins: declarative request mirroring for axum services.
//!
//! Inbound requests on configured routes are captured once and copied to
//! local handlers and remote endpoints on background tasks, while the
//! primary handler serves the caller as if nothing happened.

pub mod config;
pub mod demo;
pub mod handlers;
pub mod mirror;
pub mod server;
pub mod stats;
