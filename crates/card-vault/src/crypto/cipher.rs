//! AES-256-CBC with PKCS#7 padding over arbitrarily sized input.
//!
//! Callers hand over chunks of any length. Both directions keep the bytes that
//! do not yet form a whole block and carry them into the next call, so the
//! output is identical however the input happens to be split.
//!
//! The decryptor always holds back one full block until [`finalize`] because
//! the last block carries the padding.
//!
//! [`finalize`]: StreamDecryptor::finalize

use aes::Aes256;
use cbc::cipher::{
    block_padding::{Padding, Pkcs7},
    generic_array::GenericArray,
    BlockDecryptMut, BlockEncryptMut, InnerIvInit,
};
use thiserror::Error;

use super::container::{Iv, BLOCK_LEN};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Block = GenericArray<u8, <Aes256 as cbc::cipher::BlockSizeUser>::BlockSize>;

/// Errors produced by the cipher layer at finalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The ciphertext did not end on a block boundary, or was empty.
    #[error("ciphertext truncated: {0} trailing bytes, expected one full block")]
    Truncated(usize),

    /// The final block did not carry valid PKCS#7 padding (wrong key or
    /// corrupt data).
    #[error("invalid padding in final block")]
    InvalidPadding,
}

/// Incremental CBC encryptor.
pub struct StreamEncryptor {
    inner: Aes256CbcEnc,
    pending: Vec<u8>,
}

impl StreamEncryptor {
    /// Start a CBC chain over `cipher` seeded with `iv`.
    pub fn new(cipher: Aes256, iv: &Iv) -> Self {
        Self {
            inner: Aes256CbcEnc::inner_iv_init(cipher, GenericArray::from_slice(iv)),
            pending: Vec::with_capacity(BLOCK_LEN),
        }
    }

    /// Encrypt every whole block available after appending `input`.
    ///
    /// Returns an empty buffer when fewer than [`BLOCK_LEN`] bytes are pending.
    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(input);
        let ready = buf.len() - buf.len() % BLOCK_LEN;
        self.pending = buf.split_off(ready);
        for block in buf.chunks_exact_mut(BLOCK_LEN) {
            self.inner.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        buf
    }

    /// Pad the remaining bytes and return the final ciphertext block.
    pub fn finalize(mut self) -> Vec<u8> {
        let mut block = Block::default();
        let pos = self.pending.len();
        block[..pos].copy_from_slice(&self.pending);
        Pkcs7::pad(&mut block, pos);
        self.inner.encrypt_block_mut(&mut block);
        block.to_vec()
    }
}

/// Incremental CBC decryptor.
pub struct StreamDecryptor {
    inner: Aes256CbcDec,
    pending: Vec<u8>,
}

impl StreamDecryptor {
    /// Start a CBC chain over `cipher` seeded with `iv`.
    pub fn new(cipher: Aes256, iv: &Iv) -> Self {
        Self {
            inner: Aes256CbcDec::inner_iv_init(cipher, GenericArray::from_slice(iv)),
            pending: Vec::with_capacity(BLOCK_LEN),
        }
    }

    /// Decrypt every whole block after appending `input`, except the last
    /// complete one, which may hold padding.
    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(input);
        let keep = match buf.len() % BLOCK_LEN {
            0 => BLOCK_LEN.min(buf.len()),
            partial => partial,
        };
        let ready = buf.len() - keep;
        self.pending = buf.split_off(ready);
        for block in buf.chunks_exact_mut(BLOCK_LEN) {
            self.inner.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        buf
    }

    /// Decrypt the held-back block and strip its padding.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Truncated`] unless exactly one full block is
    /// pending, and [`CipherError::InvalidPadding`] if the padding is malformed.
    pub fn finalize(mut self) -> Result<Vec<u8>, CipherError> {
        if self.pending.len() != BLOCK_LEN {
            return Err(CipherError::Truncated(self.pending.len()));
        }
        let mut block = Block::clone_from_slice(&self.pending);
        self.inner.decrypt_block_mut(&mut block);
        let plaintext = Pkcs7::unpad(&block).map_err(|_| CipherError::InvalidPadding)?;
        Ok(plaintext.to_vec())
    }
}
