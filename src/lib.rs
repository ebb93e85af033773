//! vaultseal - client-side sealing of vault secrets
//!
//! Passwords are sealed under a user passphrase with PBKDF2-HMAC-SHA256
//! (600 000 rounds) and AES-256-GCM before they leave the client, and
//! opened again for display and autofill. The sealed form is a
//! `{ salt, iv, ciphertext }` triple of base64 strings.

#![forbid(unsafe_code)]

pub mod autofill;
pub mod entry;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
pub mod secretcrypt;
pub mod transport;

pub use error::{ErrorCategory, ErrorKind, Result, VaultError};
pub use secretcrypt::{SealedSecret, open, open_async, seal, seal_async};
