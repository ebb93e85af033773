//! Key derivation: passphrase + salt -> 256-bit AES-GCM key
//!
//! PBKDF2-HMAC-SHA256 at a fixed 600 000 rounds. The round count is
//! the only thing standing between an exfiltrated record and an offline
//! guessing attack, and every caller must agree on it for records to
//! open, so it is a constant rather than a parameter.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// PBKDF2 iteration count
pub const PBKDF2_ROUNDS: u32 = 600_000;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// A derived AES-256-GCM key.
///
/// Zeroized on drop. Deliberately neither `Clone` nor serializable.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    bytes: [u8; KEY_LEN],
}

impl VaultKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive a key from a passphrase and raw salt bytes.
///
/// Any passphrase is accepted, including the empty string; rejecting weak
/// passphrases is a policy for the caller. Fails only if the salt is not
/// exactly [`SALT_LEN`] bytes.
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Result<VaultKey> {
    if salt.len() != SALT_LEN {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::KeyDerivation,
            format!("salt must be {} bytes, got {}", SALT_LEN, salt.len()),
        ));
    }

    let mut key = VaultKey {
        bytes: [0u8; KEY_LEN],
    };
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key.bytes);
    Ok(key)
}
