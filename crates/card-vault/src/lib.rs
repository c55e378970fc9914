//! Encrypted storage for card artwork.
//!
//! Every stored asset is a container: a random 16-byte IV followed by the
//! AES-256-CBC ciphertext of the file with PKCS#7 padding. [`pipeline`]
//! provides the file encryptor, the whole-file decryptor, and a streaming
//! decrypt stage; [`server`] exposes them over HTTP.

pub mod config;
pub mod crypto;
pub mod error;
pub mod names;
pub mod pipeline;
pub mod server;
pub mod telemetry;

pub use crypto::{EncryptionKey, KeyError};
pub use error::VaultError;
