//! Passphrase reading and the per-session passphrase cache

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use std::io::{self, IsTerminal, Read, Write};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::debug;
use zeroize::Zeroizing;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase.
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>>;
}

/// Returns a fixed passphrase (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<String>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>> {
        Ok(self.passphrase.clone())
    }
}

/// Reads passphrase from any io::Read source
///
/// The whole input is the passphrase, minus one trailing line ending so
/// that `echo pass | vaultseal ...` behaves as expected.
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read + Send>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read + Send>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading passphrase: {}", e),
                e,
            )
        })?;

        let mut text = std::str::from_utf8(&data).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "passphrase is not valid UTF-8",
                e,
            )
        })?;
        if let Some(stripped) = text.strip_suffix('\n') {
            text = stripped.strip_suffix('\r').unwrap_or(stripped);
        }
        Ok(Zeroizing::new(text.to_owned()))
    }
}

/// Reads passphrase from terminal with no echo
pub struct TerminalPassphraseReader;

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read passphrase from terminal - stdin is not a terminal",
            ));
        }

        io::stderr()
            .write_all(b"Vault passphrase: ")
            .and_then(|_| io::stderr().flush())
            .map_err(|e| {
                VaultError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // Read password *without echo*
        let passphrase = rpassword::read_password().map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading passphrase: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(passphrase))
    }
}

/// Session-scoped passphrase cache.
///
/// Holds the passphrase in memory only, for as long as the session value
/// lives; it is never written anywhere. The first request prompts through
/// the wrapped reader, later requests return the cached value. An empty
/// answer to the prompt is refused and not cached, nor are prompt failures.
///
/// Safe to share between threads. Concurrent readers only take a read lock.
/// Prompts are serialised and re-check the cache first, so concurrent first
/// use normally prompts once.
pub struct PassphraseSession {
    prompt: Mutex<Box<dyn PassphraseReader + Send>>,
    cached: RwLock<Option<Zeroizing<String>>>,
}

impl PassphraseSession {
    pub fn new(prompt: Box<dyn PassphraseReader + Send>) -> Self {
        Self {
            prompt: Mutex::new(prompt),
            cached: RwLock::new(None),
        }
    }

    /// Returns the session passphrase, prompting on a cache miss.
    pub fn passphrase(&self) -> Result<Zeroizing<String>> {
        if let Some(cached) = self.cached_passphrase() {
            return Ok(cached);
        }

        let mut prompt = self.prompt.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = self.cached_passphrase() {
            return Ok(cached);
        }

        debug!("passphrase cache miss, prompting");
        let passphrase = prompt.read_passphrase()?;
        if passphrase.is_empty() {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "no passphrase entered",
            ));
        }

        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(passphrase.clone());
        Ok(passphrase)
    }

    /// Whether a passphrase is currently cached.
    pub fn is_unlocked(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Forget the cached passphrase. The next request prompts again.
    pub fn clear(&self) {
        self.cached
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn cached_passphrase(&self) -> Option<Zeroizing<String>> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PassphraseReader for PassphraseSession {
    fn read_passphrase(&mut self) -> Result<Zeroizing<String>> {
        self.passphrase()
    }
}
