//! Tracing setup: structured JSON logs plus optional OTLP span export.
//!
//! # Telemetry invariants
//!
//! - **No key material or plaintext** may appear in any span attribute or
//!   log field. Storage names and byte counts are fine.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
