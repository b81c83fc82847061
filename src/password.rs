//! Password sources for the decrypt retry loop

use crate::error::{DecryptPemError, ErrorCategory, ErrorKind, Result};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use zeroize::Zeroizing;

pub const DEFAULT_INCORRECT_MESSAGE: &str = "Incorrect password, please try again";

/// Produces successive password attempts.
pub trait PasswordSource {
    /// Produce the next password to try.
    ///
    /// Interactive sources trim surrounding whitespace. An error here is
    /// fatal to the decrypt call and is never retried.
    fn next_password(&mut self) -> Result<Zeroizing<String>>;

    /// Called after a password turned out to be wrong and another attempt
    /// will follow.
    fn report_incorrect(&mut self) {}
}

impl<T: PasswordSource + ?Sized> PasswordSource for &mut T {
    fn next_password(&mut self) -> Result<Zeroizing<String>> {
        (**self).next_password()
    }

    fn report_incorrect(&mut self) {
        (**self).report_incorrect()
    }
}

impl<T: PasswordSource + ?Sized> PasswordSource for Box<T> {
    fn next_password(&mut self) -> Result<Zeroizing<String>> {
        (**self).next_password()
    }

    fn report_incorrect(&mut self) {
        (**self).report_incorrect()
    }
}

/// Returns the same, already known, password on every attempt
///
/// The password is used exactly as given.
pub struct FixedPassword {
    password: Zeroizing<String>,
}

impl FixedPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
        }
    }
}

impl PasswordSource for FixedPassword {
    fn next_password(&mut self) -> Result<Zeroizing<String>> {
        Ok(Zeroizing::new(self.password.to_string()))
    }
}

/// Reads one newline-terminated password per attempt from any buffered reader
pub struct ReaderPasswordSource {
    reader: Box<dyn BufRead>,
}

impl ReaderPasswordSource {
    pub fn new(reader: Box<dyn BufRead>) -> Self {
        Self { reader }
    }
}

impl PasswordSource for ReaderPasswordSource {
    fn next_password(&mut self) -> Result<Zeroizing<String>> {
        let mut line = Zeroizing::new(String::new());
        let n = self.reader.read_line(&mut line).map_err(|e| {
            DecryptPemError::with_source(
                ErrorCategory::Internal,
                ErrorKind::PasswordSourceFailed,
                format!("error reading password: {}", e),
                e,
            )
        })?;
        if n == 0 {
            return Err(DecryptPemError::new(
                ErrorCategory::User,
                ErrorKind::PasswordSourceFailed,
                "no more passwords available from input",
            ));
        }
        Ok(Zeroizing::new(line.trim().to_string()))
    }
}

/// Prompts on stderr and reads the password from the terminal with no echo
pub struct TerminalPrompt {
    prompt: String,
    incorrect_message: String,
}

impl TerminalPrompt {
    pub fn new(prompt: impl Into<String>, incorrect_message: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            incorrect_message: incorrect_message.into(),
        }
    }

    /// Prompt naming the file being decrypted.
    pub fn for_file(path: &Path) -> Self {
        Self::new(
            format!("Enter password for {}: ", path.display()),
            DEFAULT_INCORRECT_MESSAGE,
        )
    }

    fn write_stderr(&self, bytes: &[u8]) -> Result<()> {
        let mut stderr = io::stderr();
        stderr
            .write_all(bytes)
            .and_then(|_| stderr.flush())
            .map_err(|e| {
                DecryptPemError::with_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new("Enter password: ", DEFAULT_INCORRECT_MESSAGE)
    }
}

impl PasswordSource for TerminalPrompt {
    /// Read a password from the terminal.
    ///
    /// Fails without prompting when stdin is not a terminal, e.g. when input
    /// is redirected from a file or pipe.
    fn next_password(&mut self) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            return Err(DecryptPemError::new(
                ErrorCategory::User,
                ErrorKind::PasswordSourceFailed,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        self.write_stderr(self.prompt.as_bytes())?;

        let password = Zeroizing::new(rpassword::read_password().map_err(|e| {
            DecryptPemError::with_source(
                ErrorCategory::Internal,
                ErrorKind::PasswordSourceFailed,
                format!("failure reading password: {}", e),
                e,
            )
        })?);

        // The newline typed by the user was not echoed.
        self.write_stderr(b"\n")?;

        Ok(Zeroizing::new(password.trim().to_string()))
    }

    fn report_incorrect(&mut self) {
        let msg = format!("{}\n", self.incorrect_message);
        if let Err(e) = self.write_stderr(msg.as_bytes()) {
            tracing::debug!(error = %e, "could not write incorrect password notice");
        }
    }
}
