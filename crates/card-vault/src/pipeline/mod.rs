//! File-to-file and file-to-stream pipelines built on [`crate::crypto`].
//!
//! Every operation is a self-contained linear pipeline
//! `source → cipher → destination`. The only shared input is the borrowed
//! [`crate::crypto::EncryptionKey`], so operations run concurrently without locks.
//!
//! # Failure semantics
//!
//! The file-writing pipelines remove their partially written destination
//! before returning an error. Removal is best effort: its own failure is
//! logged and the original error is returned unchanged. A pipeline future
//! dropped mid-write (timeout, client disconnect) removes the destination
//! through a drop guard.

pub mod decrypt;
pub mod encrypt;
pub mod stream;

pub use decrypt::decrypt;
pub use encrypt::{encrypt, Sealed};
pub use stream::{decrypt_reader, decrypt_stream, DecryptStage, IvPolicy};

use std::io::{self, ErrorKind};
use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

/// Read size used by the file-writing pipelines.
pub const READ_CHUNK: usize = 64 * 1024;

/// Outcome of removing a partial destination. Only ever logged.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Cleanup {
    Removed,
    AlreadyAbsent,
    Failed,
}

/// Remove a partially written destination after a failed pipeline.
pub(crate) async fn discard_partial(path: &Path) -> Cleanup {
    cleanup_outcome(path, fs::remove_file(path).await)
}

fn cleanup_outcome(path: &Path, removal: io::Result<()>) -> Cleanup {
    match removal {
        Ok(()) => {
            debug!(path = %path.display(), "removed partial destination");
            Cleanup::Removed
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Cleanup::AlreadyAbsent,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove partial destination");
            Cleanup::Failed
        }
    }
}

/// Removes a destination when dropped while still armed.
///
/// Taken right after the destination is created. Both the success and the
/// error path [`disarm`](PartialGuard::disarm) it, so removal on drop only
/// happens when the pipeline future itself is dropped part way.
pub(crate) struct PartialGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> PartialGuard<'a> {
    pub(crate) fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            // Drop cannot await.
            cleanup_outcome(self.path, std::fs::remove_file(self.path));
        }
    }
}

/// Create the parent directory of `path` if it has one.
pub(crate) async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}
