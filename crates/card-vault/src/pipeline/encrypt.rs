//! Encryptor: plaintext source → new container file.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use super::{discard_partial, ensure_parent, PartialGuard, READ_CHUNK};
use crate::crypto::container::{self, Iv};
use crate::crypto::{EncryptionKey, StreamEncryptor};
use crate::error::VaultError;

/// Result of a successful [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Path of the container that was written.
    pub path: PathBuf,
    /// Hex-encoded IV stored at the head of the container.
    pub iv_hex: String,
    /// Plaintext bytes consumed from the source.
    pub plaintext_len: u64,
    /// Bytes written to the container, IV included.
    pub container_len: u64,
}

/// Encrypt everything `source` yields into a new container at `destination`.
///
/// A fresh IV is drawn for every call. The parent directory is created if
/// needed. If reading, encrypting, or writing fails part way, the partial
/// destination is removed before the error is returned. Dropping the future
/// before it completes removes the destination as well.
///
/// # Errors
///
/// Returns [`VaultError::Io`] on any read, write, or directory failure.
#[instrument(skip_all, fields(destination = %destination.display()))]
pub async fn encrypt<R>(
    key: &EncryptionKey,
    source: R,
    destination: &Path,
) -> Result<Sealed, VaultError>
where
    R: AsyncRead + Unpin,
{
    ensure_parent(destination).await?;
    let file = File::create(destination).await?;
    seal_into(key, source, destination, BufWriter::new(file)).await
}

/// Run the encryption into an already opened `sink` backed by `destination`,
/// removing `destination` if anything fails or the future is dropped.
pub(crate) async fn seal_into<R, W>(
    key: &EncryptionKey,
    source: R,
    destination: &Path,
    sink: W,
) -> Result<Sealed, VaultError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let guard = PartialGuard::new(destination);
    let iv = container::generate_iv();
    match write_container(key, &iv, source, sink).await {
        Ok(plaintext_len) => {
            guard.disarm();
            let container_len = container::sealed_len(plaintext_len);
            debug!(plaintext_len, container_len, "container written");
            Ok(Sealed {
                path: destination.to_path_buf(),
                iv_hex: hex::encode(iv),
                plaintext_len,
                container_len,
            })
        }
        Err(e) => {
            discard_partial(destination).await;
            guard.disarm();
            Err(e)
        }
    }
}

/// Write `iv`, the ciphertext of `source`, and the padding block to `sink`.
///
/// Returns the number of plaintext bytes read.
pub(crate) async fn write_container<R, W>(
    key: &EncryptionKey,
    iv: &Iv,
    mut source: R,
    mut sink: W,
) -> Result<u64, VaultError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    sink.write_all(iv).await?;

    let mut cipher = StreamEncryptor::new(key.block_cipher(), iv);
    let mut buf = vec![0u8; READ_CHUNK];
    let mut plaintext_len = 0u64;
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        plaintext_len += n as u64;
        let out = cipher.update(&buf[..n]);
        if !out.is_empty() {
            sink.write_all(&out).await?;
        }
    }

    sink.write_all(&cipher.finalize()).await?;
    sink.shutdown().await?;
    Ok(plaintext_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::IV_LEN;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Writer that accepts `limit` bytes and then fails every write.
    struct FailingWriter {
        written: usize,
        limit: usize,
    }

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.written >= self.limit {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk full")));
            }
            let n = buf.len().min(self.limit - self.written);
            self.written += n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn key() -> EncryptionKey {
        EncryptionKey::from_bytes([0x11; 32])
    }

    #[tokio::test]
    async fn container_starts_with_iv() {
        let iv = [0xAB; IV_LEN];
        let mut out = Vec::new();
        let n = write_container(&key(), &iv, &b"MTG"[..], &mut out).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(out.len(), 32);
        assert_eq!(&out[..IV_LEN], &iv);
    }

    #[tokio::test]
    async fn write_failure_surfaces_as_io_error() {
        let sink = FailingWriter { written: 0, limit: 20 };
        let source = vec![0u8; 4096];
        let err = write_container(&key(), &[0; IV_LEN], &source[..], sink)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Io(_)));
    }

    #[tokio::test]
    async fn write_failure_removes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("card.png.enc");
        tokio::fs::write(&dest, b"partial").await.unwrap();

        let sink = FailingWriter { written: 0, limit: 40 };
        let source = vec![7u8; 10_000];
        let err = seal_into(&key(), &source[..], &dest, sink).await.unwrap_err();

        assert!(matches!(err, VaultError::Io(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn encrypt_reports_iv_and_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/dir/card.png.enc");
        let sealed = encrypt(&key(), &b"MTG"[..], &dest).await.unwrap();

        assert_eq!(sealed.path, dest);
        assert_eq!(sealed.plaintext_len, 3);
        assert_eq!(sealed.container_len, 32);
        assert_eq!(sealed.iv_hex.len(), 2 * IV_LEN);

        let on_disk = tokio::fs::read(&dest).await.unwrap();
        assert_eq!(on_disk.len(), 32);
        assert_eq!(hex::encode(&on_disk[..IV_LEN]), sealed.iv_hex);
    }
}
