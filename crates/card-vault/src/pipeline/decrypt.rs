//! Whole-file decryptor: container source → new plaintext file.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use super::{discard_partial, ensure_parent, PartialGuard, READ_CHUNK};
use crate::crypto::container::Iv;
use crate::crypto::{EncryptionKey, FormatError, StreamDecryptor, IV_LEN};
use crate::error::VaultError;

/// Decrypt the container read from `source` into a new file at `destination`.
///
/// The IV is read before `destination` is created, so a source shorter than
/// [`IV_LEN`] leaves nothing behind. Later failures remove the partially
/// written destination before the error is returned, and so does dropping
/// the future once the destination exists.
///
/// Returns the number of plaintext bytes written.
///
/// # Errors
///
/// Returns [`VaultError::Format`] if the source holds fewer than [`IV_LEN`]
/// bytes, [`VaultError::Cipher`] if the ciphertext is truncated or its padding
/// is invalid, and [`VaultError::Io`] on read or write failure.
#[instrument(skip_all, fields(destination = %destination.display()))]
pub async fn decrypt<R>(
    key: &EncryptionKey,
    mut source: R,
    destination: &Path,
) -> Result<u64, VaultError>
where
    R: AsyncRead + Unpin,
{
    let iv = read_iv(&mut source).await?;
    ensure_parent(destination).await?;
    let file = File::create(destination).await?;
    let guard = PartialGuard::new(destination);

    match write_plaintext(key, &iv, source, BufWriter::new(file)).await {
        Ok(written) => {
            guard.disarm();
            debug!(plaintext_len = written, "container decrypted");
            Ok(written)
        }
        Err(e) => {
            discard_partial(destination).await;
            guard.disarm();
            Err(e)
        }
    }
}

/// Fill an IV from the head of `source`, tolerating short reads.
pub(crate) async fn read_iv<R>(source: &mut R) -> Result<Iv, VaultError>
where
    R: AsyncRead + Unpin,
{
    let mut iv = [0u8; IV_LEN];
    let mut filled = 0;
    while filled < IV_LEN {
        let n = source.read(&mut iv[filled..]).await?;
        if n == 0 {
            return Err(FormatError::TooShort(filled as u64).into());
        }
        filled += n;
    }
    Ok(iv)
}

async fn write_plaintext<R, W>(
    key: &EncryptionKey,
    iv: &Iv,
    mut source: R,
    mut sink: W,
) -> Result<u64, VaultError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut decipher = StreamDecryptor::new(key.block_cipher(), iv);
    let mut buf = vec![0u8; READ_CHUNK];
    let mut written = 0u64;
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let out = decipher.update(&buf[..n]);
        if !out.is_empty() {
            sink.write_all(&out).await?;
            written += out.len() as u64;
        }
    }

    let tail = decipher.finalize()?;
    sink.write_all(&tail).await?;
    written += tail.len() as u64;
    sink.shutdown().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CipherError;

    fn key() -> EncryptionKey {
        EncryptionKey::from_bytes([0x22; 32])
    }

    #[tokio::test]
    async fn read_iv_assembles_short_reads() {
        let data: Vec<u8> = (0..20).collect();
        // Chain splits the header across two readers.
        let mut source = (&data[..5]).chain(&data[5..]);
        let iv = read_iv(&mut source).await.unwrap();
        assert_eq!(&iv[..], &data[..IV_LEN]);
    }

    #[tokio::test]
    async fn short_source_is_format_error_without_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.png");
        let err = decrypt(&key(), &[0u8; 10][..], &dest).await.unwrap_err();
        assert!(matches!(err, VaultError::Format(FormatError::TooShort(10))));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn iv_only_container_fails_at_finalization() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.png");
        let err = decrypt(&key(), &[0u8; IV_LEN][..], &dest).await.unwrap_err();
        assert!(matches!(err, VaultError::Cipher(CipherError::Truncated(0))));
        assert!(!dest.exists());
    }
}
