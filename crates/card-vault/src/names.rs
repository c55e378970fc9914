//! Opaque storage names for containers.
//!
//! A stored name looks like `<32 hex digits>.<ext>.enc`, where `<ext>` is the
//! lowercased extension of the uploaded file (omitted when it is missing or
//! unusual). The hex stem hashes the original base name with a timestamp and a
//! random UUID, so names are unlikely to collide but are not meant to be
//! unpredictable.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Marker appended to every container name.
pub const CONTAINER_SUFFIX: &str = ".enc";

/// Hex digits in the opaque stem.
const STEM_LEN: usize = 32;

const MAX_EXT_LEN: usize = 10;

/// Generate an opaque storage name for an uploaded file called `original`.
pub fn obfuscated_name(original: &str) -> String {
    let path = Path::new(original);
    let base = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(millis.to_be_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let stem = hex::encode(&hasher.finalize()[..STEM_LEN / 2]);

    match path.extension().and_then(|e| e.to_str()).filter(|e| is_safe_ext(e)) {
        Some(ext) => format!("{stem}.{}{CONTAINER_SUFFIX}", ext.to_ascii_lowercase()),
        None => format!("{stem}{CONTAINER_SUFFIX}"),
    }
}

/// Whether `name` has the shape produced by [`obfuscated_name`].
///
/// Path separators and `..` never match.
pub fn is_storage_name(name: &str) -> bool {
    let Some(rest) = name.strip_suffix(CONTAINER_SUFFIX) else {
        return false;
    };
    let (stem, ext) = match rest.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (rest, None),
    };
    let stem_ok = stem.len() == STEM_LEN
        && stem.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    let ext_ok = ext.map_or(true, |e| is_safe_ext(e) && !e.bytes().any(|b| b.is_ascii_uppercase()));
    stem_ok && ext_ok
}

/// MIME type for the original file behind a storage name.
pub fn content_type(storage_name: &str) -> &'static str {
    let original = storage_name
        .strip_suffix(CONTAINER_SUFFIX)
        .unwrap_or(storage_name);
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn is_safe_ext(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= MAX_EXT_LEN && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}
