//! Tracing setup shared by http-twins binaries: fmt or JSON logging with
//! optional OTLP span export.

pub mod config;
pub mod otlp;
pub mod spans;

pub use config::{LogFormat, OtlpProtocol, TracingConfig};
pub use otlp::{init_tracing, TracingGuard};
