//! Record file operations
//!
//! A record file holds one sealed secret as JSON:
//! `{ "salt": "...", "iv": "...", "ciphertext": "..." }`, the same triple the
//! vault API carries. These functions back the command-line tool.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::passphrase::PassphraseReader;
use crate::secretcrypt::{self, SealedSecret};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;
use zeroize::Zeroizing;

/// Seal the text in `input_path` into a record at `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn seal_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let plaintext = read_text(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let sealed = secretcrypt::seal(&plaintext, &passphrase)
        .map_err(|e| e.with_context("failed to seal"))?;
    write_file_secure(output_path, &record_json(&sealed)?)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    debug!(path = %output_path.display(), "wrote sealed record");
    Ok(())
}

/// Open the record at `input_path` and write its plaintext to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
/// Nothing is written if the record does not open.
pub fn open_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let sealed = read_record(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let plaintext = sealed
        .open(&passphrase)
        .map_err(|e| e.with_context("failed to open record"))?;
    write_file_secure(output_path, plaintext.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    Ok(())
}

/// Replace the secret in an existing record with new plaintext.
///
/// This function:
/// 1. Opens the existing record at `record_path` to validate the passphrase
/// 2. Reads new plaintext from `plain_path`
/// 3. Seals it with a fresh salt and iv under the validated passphrase
/// 4. Atomically writes to `record_path` (tempfile + fsync + rename)
///
/// The passphrase validation prevents accidental passphrase changes.
pub fn reseal_file(
    plain_path: &Path,
    record_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let existing = read_record(record_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;

    // Validate passphrase by opening the existing record (discard plaintext)
    existing
        .open(&passphrase)
        .map_err(|e| e.with_context("failed to open existing record"))?;

    let new_plaintext = read_text(plain_path)?;
    let sealed = secretcrypt::seal(&new_plaintext, &passphrase)
        .map_err(|e| e.with_context("failed to seal"))?;
    let contents = record_json(&sealed)?;

    let record_dir = match record_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(record_dir)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to create tempfile", e))?;
    temp_file
        .write_all(&contents)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to flush tempfile", e))?;
    temp_file.as_file().sync_all().map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                io_error(
                    ErrorCategory::Internal,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }
    temp_file.persist(record_path).map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            format!("failed to rename to target file {}", record_path.display()),
            e.error,
        )
    })?;
    debug!(path = %record_path.display(), "resealed record");
    Ok(())
}

/// Read and parse a record file.
pub fn read_record(path: &Path) -> Result<SealedSecret> {
    let contents = fs::read(path).map_err(|e| read_error(path, e))?;
    serde_json::from_slice(&contents).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::RecordFormat,
            format!("{} is not a sealed record: {}", path.display(), e),
            e,
        )
    })
}

fn record_json(sealed: &SealedSecret) -> Result<Vec<u8>> {
    let mut json = serde_json::to_vec_pretty(sealed).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "failed to serialize record",
            e,
        )
    })?;
    json.push(b'\n');
    Ok(json)
}

/// Reads a plaintext file. Both the raw bytes and the text are wiped on drop.
fn read_text(path: &Path) -> Result<Zeroizing<String>> {
    let bytes = Zeroizing::new(fs::read(path).map_err(|e| read_error(path, e))?);
    match std::str::from_utf8(&bytes) {
        Ok(text) => Ok(Zeroizing::new(text.to_owned())),
        Err(e) => Err(VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Encoding,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )),
    }
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                io_error(
                    ErrorCategory::User,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            io_error(
                ErrorCategory::Internal,
                format!("failed to write {}", path.display()),
                e,
            )
        })
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            io_error(
                ErrorCategory::User,
                format!("failed to write {}", path.display()),
                e,
            )
        })
    }
}

fn io_error(category: ErrorCategory, msg: impl Into<String>, err: io::Error) -> VaultError {
    VaultError::with_kind_and_source(category, ErrorKind::Io, msg, err)
}

fn read_error(path: &Path, err: io::Error) -> VaultError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    io_error(
        category,
        format!("failed to read from {}", path.display()),
        err,
    )
}
