//! Limits applied by the router's middleware layers.
//!
//! Includes request tracing, timeout enforcement, response compression, and
//! the request body cap.

use std::time::Duration;

/// Default per-request timeout applied to all routes.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on upload bodies.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Tunables for the middleware stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Time allowed until a response starts.
    pub request_timeout: Duration,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
