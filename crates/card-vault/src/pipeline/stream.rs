//! Streaming decrypt stage: ciphertext chunks in, plaintext chunks out.
//!
//! [`DecryptStage`] is the state machine; [`decrypt_stream`] drives it from a
//! byte stream and yields plaintext lazily, one output item per consumed
//! input chunk. Nothing is read from the source until the consumer polls, and
//! dropping the returned stream drops the source with it, so a disconnected
//! client releases the file handle immediately.

use std::io;

use aes::Aes256;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::crypto::{EncryptionKey, FormatError, Iv, StreamDecryptor, IV_LEN};
use crate::error::VaultError;

/// How the stage obtains the IV from the head of the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IvPolicy {
    /// The first non-empty chunk must carry all [`IV_LEN`] bytes; a shorter
    /// chunk is a [`FormatError::SplitIv`].
    #[default]
    FirstChunk,
    /// Hold up to `IV_LEN - 1` bytes across chunks until the IV is complete.
    Accumulate,
}

enum State {
    AwaitingIv { held: Vec<u8> },
    Streaming(StreamDecryptor),
}

/// Chunk-at-a-time container decryptor.
///
/// Holds at most one cipher block of ciphertext between calls (plus, under
/// [`IvPolicy::Accumulate`], fewer than [`IV_LEN`] header bytes).
pub struct DecryptStage {
    cipher: Aes256,
    policy: IvPolicy,
    state: State,
}

impl DecryptStage {
    /// Create a stage using [`IvPolicy::FirstChunk`].
    pub fn new(key: &EncryptionKey) -> Self {
        Self::with_policy(key, IvPolicy::default())
    }

    /// Create a stage with an explicit IV policy.
    pub fn with_policy(key: &EncryptionKey, policy: IvPolicy) -> Self {
        Self {
            cipher: key.block_cipher(),
            policy,
            state: State::AwaitingIv { held: Vec::new() },
        }
    }

    /// Whether the IV has been read and the decipher initialised.
    pub fn iv_established(&self) -> bool {
        matches!(self.state, State::Streaming(_))
    }

    /// Consume one ciphertext chunk and return the plaintext it releases.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::SplitIv`] when, under [`IvPolicy::FirstChunk`],
    /// the first non-empty chunk is shorter than [`IV_LEN`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>, VaultError> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }
        match &mut self.state {
            State::Streaming(decipher) => Ok(decipher.update(chunk)),
            State::AwaitingIv { held } => {
                let available = held.len() + chunk.len();
                if available < IV_LEN {
                    if self.policy == IvPolicy::FirstChunk {
                        return Err(FormatError::SplitIv(available).into());
                    }
                    held.extend_from_slice(chunk);
                    return Ok(Vec::new());
                }

                let from_chunk = IV_LEN - held.len();
                let mut iv: Iv = [0u8; IV_LEN];
                iv[..held.len()].copy_from_slice(held);
                iv[held.len()..].copy_from_slice(&chunk[..from_chunk]);

                let mut decipher = StreamDecryptor::new(self.cipher.clone(), &iv);
                let out = decipher.update(&chunk[from_chunk..]);
                self.state = State::Streaming(decipher);
                Ok(out)
            }
        }
    }

    /// Finalize the decipher and return the trailing plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::TooShort`] if the source ended before the IV
    /// was complete, and [`VaultError::Cipher`] on truncated ciphertext or bad
    /// padding.
    pub fn finish(self) -> Result<Vec<u8>, VaultError> {
        match self.state {
            State::AwaitingIv { held } => Err(FormatError::TooShort(held.len() as u64).into()),
            State::Streaming(decipher) => Ok(decipher.finalize()?),
        }
    }
}

/// Decrypt a container arriving as a byte stream.
///
/// Yields plaintext as each source chunk is deciphered. The first error ends
/// the stream after it has been yielded; no further source reads happen.
pub fn decrypt_stream<S>(
    key: &EncryptionKey,
    source: S,
    policy: IvPolicy,
) -> impl Stream<Item = Result<Bytes, VaultError>> + Send + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Send + Unpin + 'static,
{
    let stage = DecryptStage::with_policy(key, policy);
    futures::stream::unfold(Some((source, stage)), |state| async move {
        let (mut source, mut stage) = state?;
        loop {
            match source.next().await {
                Some(Ok(chunk)) => match stage.feed(&chunk) {
                    Ok(out) if out.is_empty() => continue,
                    Ok(out) => return Some((Ok(Bytes::from(out)), Some((source, stage)))),
                    Err(e) => return Some((Err(e), None)),
                },
                Some(Err(e)) => return Some((Err(VaultError::from(e)), None)),
                None => {
                    debug!("decrypt stream reached end of source");
                    return match stage.finish() {
                        Ok(tail) if tail.is_empty() => None,
                        Ok(tail) => Some((Ok(Bytes::from(tail)), None)),
                        Err(e) => Some((Err(e), None)),
                    };
                }
            }
        }
    })
}

/// Decrypt a container read from `reader` in chunks of up to `chunk_size` bytes.
pub fn decrypt_reader<R>(
    key: &EncryptionKey,
    reader: R,
    chunk_size: usize,
    policy: IvPolicy,
) -> impl Stream<Item = Result<Bytes, VaultError>> + Send + 'static
where
    R: AsyncRead + Send + Unpin + 'static,
{
    decrypt_stream(key, ReaderStream::with_capacity(reader, chunk_size), policy)
}
