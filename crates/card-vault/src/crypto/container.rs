//! Persisted container layout and length arithmetic.
//!
//! ```text
//! offset 0..16   : IV, raw bytes
//! offset 16..N   : AES-256-CBC ciphertext of PKCS#7-padded plaintext
//! ```
//!
//! There is no version tag, length field, or integrity tag. End of file marks
//! the end of the ciphertext.

use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Byte length of the IV stored at the head of every container.
pub const IV_LEN: usize = 16;

/// AES block size. Ciphertext length is always a multiple of this.
pub const BLOCK_LEN: usize = 16;

/// Raw IV bytes.
pub type Iv = [u8; IV_LEN];

/// Container layout violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The source ended before a full IV was read.
    #[error("container too short: {0} bytes, expected at least {IV_LEN}")]
    TooShort(u64),

    /// The first streamed chunk could not supply the whole IV.
    #[error("first chunk carried {0} bytes, the IV needs {IV_LEN}")]
    SplitIv(usize),

    /// The ciphertext after the IV is not a whole number of blocks.
    #[error("ciphertext length {0} is not a multiple of {BLOCK_LEN}")]
    Misaligned(u64),
}

/// Generate a fresh IV from the OS CSPRNG.
pub fn generate_iv() -> Iv {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Total container length produced for a plaintext of `plaintext_len` bytes.
///
/// PKCS#7 always adds between 1 and 16 bytes, so block-aligned input gains a
/// whole extra block.
pub fn sealed_len(plaintext_len: u64) -> u64 {
    let block = BLOCK_LEN as u64;
    IV_LEN as u64 + (plaintext_len / block + 1) * block
}

/// Check a container length against the layout invariants.
///
/// A container holding an IV and no ciphertext passes here; it is rejected
/// later when the decipher finalizes.
///
/// # Errors
///
/// Returns [`FormatError::TooShort`] below [`IV_LEN`] bytes and
/// [`FormatError::Misaligned`] if the ciphertext is not block aligned.
pub fn check_len(container_len: u64) -> Result<(), FormatError> {
    if container_len < IV_LEN as u64 {
        return Err(FormatError::TooShort(container_len));
    }
    let ciphertext_len = container_len - IV_LEN as u64;
    if ciphertext_len % BLOCK_LEN as u64 != 0 {
        return Err(FormatError::Misaligned(ciphertext_len));
    }
    Ok(())
}
