//! [`EncryptionKey`]: the process-wide AES-256 key and its loader.

use aes::cipher::{generic_array::GenericArray, KeyInit};
use aes::Aes256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Errors produced while resolving the configured key.
///
/// Messages never include any part of the configured value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// No key was configured, or the value is blank.
    #[error("encryption key is not configured")]
    Missing,

    /// The configured value is not valid hexadecimal.
    #[error("encryption key is not valid hex")]
    NotHex,

    /// The value decodes to the wrong number of bytes.
    #[error("encryption key must decode to {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Fixed-size key buffer holding exactly [`KEY_LEN`] bytes.
///
/// The bytes are zeroed when the key is dropped. Cipher operations borrow the
/// key and derive their own block cipher instance from it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey(Box<[u8; KEY_LEN]>);

impl EncryptionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Box::new(bytes))
    }

    /// Decode a key from its hexadecimal text form.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Missing`] for a blank value, [`KeyError::NotHex`] if
    /// the text is not hex, and [`KeyError::InvalidLength`] if it does not
    /// decode to exactly [`KEY_LEN`] bytes.
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(KeyError::Missing);
        }
        let mut decoded = hex::decode(text).map_err(|_| KeyError::NotHex)?;
        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(KeyError::InvalidLength(len));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(buf))
    }

    /// Build the AES-256 block cipher keyed with these bytes.
    pub(crate) fn block_cipher(&self) -> Aes256 {
        Aes256::new(GenericArray::from_slice(&self.0[..]))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Resolve the process-wide key from its configured hex value.
///
/// Intended to run once at startup so that a missing or malformed key stops
/// the process before any cipher operation is attempted.
///
/// # Errors
///
/// Returns [`KeyError::Missing`] when `configured` is `None`, otherwise the
/// errors of [`EncryptionKey::from_hex`].
pub fn load(configured: Option<&str>) -> Result<EncryptionKey, KeyError> {
    EncryptionKey::from_hex(configured.ok_or(KeyError::Missing)?)
}
