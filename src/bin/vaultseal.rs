//! vaultseal CLI - seal and open vault secrets
//!
//! Command-line interface for sealing secrets into JSON records using
//! PBKDF2-HMAC-SHA256 key derivation and AES-256-GCM, and for opening
//! records and autofill suggestion payloads.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::error::Error as StdError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use vaultseal::autofill::{self, SuggestionPayload};
use vaultseal::error::{ErrorCategory, ErrorKind, Result, VaultError};
use vaultseal::file_ops;
use vaultseal::passphrase::{
    PassphraseReader, PassphraseSession, ReaderPassphraseReader, TerminalPassphraseReader,
};

#[derive(Parser)]
#[command(name = "vaultseal")]
#[command(version)]
#[command(about = "Passphrase-based sealing of vault secrets.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a secret into a record
    #[command(alias = "s")]
    Seal {
        /// Path to the file whose text is to be sealed
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the record file to write
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Open a record
    #[command(alias = "o")]
    Open {
        /// Path to the record file to open
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the secret to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Replace the secret in a record, while validating
    /// that the passphrase is not accidentally changed.
    #[command(alias = "r")]
    Reseal {
        /// Path to the file whose text is to be sealed
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing record to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Open the first exact match of an autofill suggestion payload and
    /// print it as JSON
    Autofill {
        /// Path to the suggestion payload
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut session = PassphraseSession::new(get_passphrase_reader(cli.passphrase_stdin));

    let result = match cli.command {
        Commands::Seal { input, output } => file_ops::seal_file(&input, &output, &mut session),
        Commands::Open { input, output } => file_ops::open_file(&input, &output, &mut session),
        Commands::Reseal { input, output } => {
            file_ops::reseal_file(&input, &output, &mut session)
        }
        Commands::Autofill { input } => run_autofill(&input, &session),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

fn run_autofill(input: &Path, session: &PassphraseSession) -> Result<()> {
    let contents = fs::read(input).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to read from {}", input.display()),
            e,
        )
    })?;
    let payload: SuggestionPayload = serde_json::from_slice(&contents).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::RecordFormat,
            format!("{} is not a suggestion payload: {}", input.display(), e),
            e,
        )
    })?;

    let passphrase = session.passphrase()?;
    match autofill::resolve_autofill(&payload, &passphrase)? {
        Some(credential) => {
            let filled = FilledCredential {
                login: credential.login.as_deref(),
                password: credential.password.as_str(),
            };
            write_json_line(&mut std::io::stdout().lock(), &filled)?;
        }
        None => eprintln!("no exact suggestion in payload"),
    }
    Ok(())
}

/// Autofill output. Borrows the opened password so the only owned copy stays
/// in its `Zeroizing` buffer.
#[derive(Serialize)]
struct FilledCredential<'a> {
    login: Option<&'a str>,
    password: &'a str,
}

fn write_json_line(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer(&mut *out, value)
        .map_err(io::Error::from)
        .and_then(|()| writeln!(out))
        .and_then(|()| out.flush())
        .map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                "failed to write to stdout",
                e,
            )
        })
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader + Send> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

/// Initializes the tracing subscriber, writing to stderr so stdout stays
/// clean for command output.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vaultseal={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Renders an error and its context chain as `outer: inner: ...`.
///
/// Foreign sources are not rendered; their text is already part of the
/// message that wraps them.
fn error_chain(err: &VaultError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source.and_then(|s| s.downcast_ref::<VaultError>()) {
        rendered.push_str(": ");
        rendered.push_str(cause.message());
        source = cause.source();
    }
    rendered
}
