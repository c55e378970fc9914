//! AES-256-CBC container primitives.
//!
//! This module is free of filesystem and HTTP dependencies. It provides the
//! key, the container layout, and the incremental cipher used by
//! [`crate::pipeline`].
//!
//! # Container format
//!
//! ```text
//! IV (16 bytes) || AES-256-CBC(PKCS#7(plaintext))
//! ```
//!
//! The format is unauthenticated: a flipped ciphertext bit yields garbled
//! plaintext rather than an error unless it happens to break the padding.

pub mod cipher;
pub mod container;
pub mod key;

pub use cipher::{CipherError, StreamDecryptor, StreamEncryptor};
pub use container::{FormatError, Iv, BLOCK_LEN, IV_LEN};
pub use key::{EncryptionKey, KeyError, KEY_LEN};
