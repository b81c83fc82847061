//! decryptpem CLI - decrypt the first PEM block of a file
//!
//! Prompts for the password on the terminal (or reads one password per line
//! from stdin with `--password-stdin`) and writes the decrypted block in PEM
//! form to a file or stdout.

use clap::Parser;
use std::error::Error as StdError;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use decryptpem::file_ops;
use decryptpem::password::{PasswordSource, ReaderPasswordSource, TerminalPrompt};
use decryptpem::{DecryptPemError, DecryptionPolicy, ErrorCategory, ErrorKind, pem};

#[derive(Parser)]
#[command(name = "decryptpem")]
#[command(version)]
#[command(about = "Decrypt password-protected PEM files.", long_about = None)]
struct Cli {
    /// Read passwords from stdin, one per line, instead of from the terminal
    #[arg(long)]
    password_stdin: bool,

    /// Maximum number of password attempts (0 = unlimited)
    #[arg(long, value_name = "N", default_value_t = 0)]
    max_tries: u32,

    /// Delay before each password attempt, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    password_delay_ms: u64,

    /// Path to the PEM file to decrypt
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Path to write the decrypted PEM block to (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

fn run(cli: &Cli) -> decryptpem::Result<()> {
    let policy = DecryptionPolicy::new()
        .with_max_tries(cli.max_tries)
        .with_password_delay(Duration::from_millis(cli.password_delay_ms));

    let mut source = get_password_source(cli);
    let block = file_ops::decrypt_file(&cli.input, &mut *source, &policy)?;

    match &cli.output {
        Some(path) => file_ops::write_pem_file(path, &block),
        None => {
            let encoded = zeroize::Zeroizing::new(pem::encode(&block));
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(encoded.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| {
                    DecryptPemError::with_source(
                        ErrorCategory::Internal,
                        ErrorKind::Io,
                        "failed to write to stdout",
                        e,
                    )
                })
        }
    }
}

fn get_password_source(cli: &Cli) -> Box<dyn PasswordSource> {
    if cli.password_stdin {
        Box::new(ReaderPasswordSource::new(Box::new(io::stdin().lock())))
    } else {
        Box::new(TerminalPrompt::for_file(&cli.input))
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
