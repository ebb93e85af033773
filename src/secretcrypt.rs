//! Sealing and opening of vault secrets using PBKDF2 + AES-256-GCM
//!
//! A sealed secret is the triple:
//! - salt: 16 random bytes, input to key derivation
//! - iv: 12 random bytes, the AES-GCM nonce
//! - ciphertext: AES-GCM output, including the 16-byte tag
//!
//! Each field is base64 text so the triple can be embedded in JSON. The
//! three belong together: opening with any field from another record fails
//! tag verification.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::kdf::{self, PBKDF2_ROUNDS, SALT_LEN, VaultKey};
use crate::transport;

/// Length of the AES-GCM nonce in bytes
pub const IV_LEN: usize = 12;

/// Length of the AES-GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// The transport form of one sealed secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    pub salt: String,
    pub iv: String,
    pub ciphertext: String,
}

impl SealedSecret {
    /// Open this secret with `passphrase`. See [`open`].
    pub fn open(&self, passphrase: &str) -> Result<Zeroizing<String>> {
        open(&self.ciphertext, passphrase, &self.salt, &self.iv)
    }
}

/// Seal `plaintext` under `passphrase` using a fresh random salt and iv.
///
/// Sealing the same plaintext twice yields unrelated triples.
pub fn seal(plaintext: &str, passphrase: &str) -> Result<SealedSecret> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    seal_with(plaintext, passphrase, &salt, &iv)
}

/// Seal `plaintext` under `passphrase` using the provided salt and iv.
///
/// This function is ONLY for producing fixed test vectors.
/// NEVER use this in production - always use `seal()` which generates random salt/iv.
pub fn seal_with(
    plaintext: &str,
    passphrase: &str,
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> Result<SealedSecret> {
    debug!(rounds = PBKDF2_ROUNDS, "sealing secret");
    let key = kdf::derive_key(passphrase, salt)?;
    let cipher = new_cipher(&key)?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(iv), plaintext.as_bytes())
        .map_err(|_| {
            VaultError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Cipher,
                "AES-GCM encryption failed",
            )
        })?;

    Ok(SealedSecret {
        salt: transport::encode(salt),
        iv: transport::encode(iv),
        ciphertext: transport::encode(&ciphertext),
    })
}

/// Open a sealed secret, returning the original plaintext.
///
/// A wrong passphrase and a tampered or mismatched triple both fail with
/// [`ErrorKind::Decryption`] and the same message; callers cannot and must
/// not try to tell them apart. Nothing is ever returned unless the tag
/// verifies.
pub fn open(
    ciphertext: &str,
    passphrase: &str,
    salt: &str,
    iv: &str,
) -> Result<Zeroizing<String>> {
    let ciphertext = transport::decode("ciphertext", ciphertext)?;
    let salt = transport::decode("salt", salt)?;
    let iv: [u8; IV_LEN] = transport::decode_array("iv", iv)?;

    debug!(rounds = PBKDF2_ROUNDS, len = ciphertext.len(), "opening secret");
    let key = kdf::derive_key(passphrase, &salt)?;
    let cipher = new_cipher(&key)?;

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| {
                VaultError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::Decryption,
                    "wrong passphrase or corrupted data",
                )
            })?,
    );

    match std::str::from_utf8(&plaintext) {
        Ok(text) => Ok(Zeroizing::new(text.to_owned())),
        Err(e) => Err(VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Encoding,
            "opened secret is not valid UTF-8",
            e,
        )),
    }
}

/// [`seal`] on the blocking thread pool, for async callers.
///
/// Must be called from within a tokio runtime.
pub async fn seal_async(
    plaintext: Zeroizing<String>,
    passphrase: Zeroizing<String>,
) -> Result<SealedSecret> {
    tokio::task::spawn_blocking(move || seal(&plaintext, &passphrase))
        .await
        .map_err(join_error)?
}

/// [`open`] on the blocking thread pool, for async callers.
///
/// Must be called from within a tokio runtime.
pub async fn open_async(
    secret: SealedSecret,
    passphrase: Zeroizing<String>,
) -> Result<Zeroizing<String>> {
    tokio::task::spawn_blocking(move || secret.open(&passphrase))
        .await
        .map_err(join_error)?
}

fn new_cipher(key: &VaultKey) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| {
        VaultError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "derived key has the wrong length for AES-256-GCM",
        )
    })
}

fn join_error(err: tokio::task::JoinError) -> VaultError {
    VaultError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::InternalInvariant,
        "crypto task did not complete",
        err,
    )
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Each case pays for two 600k-round derivations.
        #![proptest_config(ProptestConfig::with_cases(4))]

        #[test]
        fn prop_round_trip(plaintext in ".{0,64}", passphrase in ".{0,32}") {
            let sealed = seal(&plaintext, &passphrase).unwrap();
            let opened = sealed.open(&passphrase).unwrap();
            prop_assert_eq!(opened.as_str(), plaintext.as_str());
        }

        #[test]
        fn prop_wrong_passphrase_rejected(plaintext in ".{0,64}", passphrase in "[a-z]{1,16}") {
            let sealed = seal(&plaintext, &passphrase).unwrap();
            let wrong = format!("{}!", passphrase);
            let err = sealed.open(&wrong).unwrap_err();
            prop_assert_eq!(err.kind, Some(ErrorKind::Decryption));
        }

        #[test]
        fn prop_tamper_detected(
            field in 0..3usize,
            index in any::<prop::sample::Index>(),
            bit in 0..8u8,
        ) {
            let sealed = seal("secret data", "test").unwrap();
            let encoded = match field {
                0 => &sealed.salt,
                1 => &sealed.iv,
                _ => &sealed.ciphertext,
            };
            let mut bytes = transport::decode("field", encoded).unwrap();
            let at = index.index(bytes.len());
            bytes[at] ^= 1 << bit;
            let flipped = transport::encode(&bytes);

            let tampered = match field {
                0 => SealedSecret { salt: flipped, ..sealed.clone() },
                1 => SealedSecret { iv: flipped, ..sealed.clone() },
                _ => SealedSecret { ciphertext: flipped, ..sealed.clone() },
            };
            let err = tampered.open("test").unwrap_err();
            prop_assert_eq!(err.kind, Some(ErrorKind::Decryption));
        }
    }
}
