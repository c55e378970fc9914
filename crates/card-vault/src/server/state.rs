//! Shared application state injected into every Axum handler.

use std::path::PathBuf;
use std::sync::Arc;

use crate::crypto::EncryptionKey;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable so that Axum can clone the state for each
/// request without copying the key.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide key, lent to each pipeline by reference.
    pub key: Arc<EncryptionKey>,
    /// Directory holding encrypted containers.
    pub storage_dir: Arc<PathBuf>,
    /// Read size used when streaming a container to a client.
    pub stream_chunk_size: usize,
}

impl AppState {
    /// Create a new [`AppState`].
    pub fn new(key: EncryptionKey, storage_dir: PathBuf, stream_chunk_size: usize) -> Self {
        Self {
            key: Arc::new(key),
            storage_dir: Arc::new(storage_dir),
            stream_chunk_size,
        }
    }
}
