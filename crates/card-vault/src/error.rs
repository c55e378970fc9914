//! Error type returned by every vault operation.

use common::ServiceError;
use thiserror::Error;

use crate::crypto::{CipherError, FormatError, KeyError};

/// Errors surfaced by the encrypt, decrypt, and streaming pipelines.
///
/// None of these are retried internally.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The configured key is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(#[from] KeyError),

    /// The input does not follow the container layout.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Reading the source, writing the destination, or creating directories failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decipher finalization rejected the ciphertext.
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
}

impl From<VaultError> for ServiceError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Configuration(_) => ServiceError::Unavailable("encryption key unavailable".into()),
            VaultError::Format(e) => ServiceError::CorruptAsset(e.to_string()),
            VaultError::Cipher(e) => ServiceError::CorruptAsset(e.to_string()),
            VaultError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ServiceError::NotFound("asset does not exist".into())
            }
            VaultError::Io(_) => ServiceError::Internal("storage I/O failed".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_cipher_errors_are_corrupt_assets() {
        let e: ServiceError = VaultError::from(FormatError::TooShort(3)).into();
        assert_eq!(e.code(), "corrupt_asset");
        let e: ServiceError = VaultError::from(CipherError::InvalidPadding).into();
        assert_eq!(e.code(), "corrupt_asset");
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: ServiceError = VaultError::from(io).into();
        assert_eq!(e.http_status(), 404);
    }

    #[test]
    fn io_details_are_not_exposed() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/secret/path");
        let e: ServiceError = VaultError::from(io).into();
        assert_eq!(e.http_status(), 500);
        assert!(!e.to_string().contains("/srv/secret/path"));
    }
}
