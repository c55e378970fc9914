//! Request and response types exchanged with HTTP clients.
//!
//! Asset bodies travel as raw bytes; only metadata and errors are JSON.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Upload endpoint
// ---------------------------------------------------------------------------

/// Successful response body for `POST /assets/:name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Opaque name the container was stored under; used to fetch it back.
    pub storage_name: String,
    /// Hex-encoded IV embedded at the head of the container.
    pub iv_hex: String,
    /// Number of plaintext bytes received.
    pub plaintext_bytes: u64,
    /// Size of the container written to disk.
    pub container_bytes: u64,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"not_found"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the container storage directory is present.
    pub storage_ready: bool,
}
