//! Transport encoding for sealed fields
//!
//! Salt, iv and ciphertext travel as JSON string fields. They use the
//! standard base64 alphabet with padding, which is what the browser's
//! `btoa`/`atob` produce and accept, so records stay interoperable with
//! the web client and the extension.
//!
//! Decoding is strict: unpadded input, the URL-safe alphabet and embedded
//! whitespace are all rejected as [`ErrorKind::Encoding`]. `atob` tolerates
//! missing padding and whitespace, but every client here emits padded
//! `btoa` output, so nothing lenient is needed.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use base64::{Engine, engine::general_purpose::STANDARD};

/// Encode bytes for transport.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a transport field back to bytes.
///
/// `field` names the field in error messages.
pub fn decode(field: &str, encoded: &str) -> Result<Vec<u8>> {
    STANDARD.decode(encoded).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Encoding,
            format!("{} is not valid base64: {}", field, e),
            e,
        )
    })
}

/// Decode a transport field that must have an exact width, such as the iv.
pub fn decode_array<const N: usize>(field: &str, encoded: &str) -> Result<[u8; N]> {
    let bytes = decode(field, encoded)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::Encoding,
            format!("{} must decode to {} bytes, got {}", field, N, len),
        )
    })
}
