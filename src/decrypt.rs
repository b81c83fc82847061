//! Locate a PEM block and decrypt it, retrying on wrong passwords
//!
//! Unencrypted blocks are returned as found without ever consulting the
//! password source, so a prompting source is safe to use on plaintext input
//! even without a terminal.

use crate::error::{DecryptPemError, ErrorCategory, ErrorKind, Result};
use crate::legacy::{self, Decrypted};
use crate::password::PasswordSource;
use crate::pem::{self, PemBlock};
use crate::policy::DecryptionPolicy;
use std::thread;

/// Result of a bytes-level decrypt, together with the unconsumed input.
///
/// `rest` is populated on failure too: it is everything after the first
/// block, or the whole input when no block was found.
#[derive(Debug)]
pub struct DecryptOutcome<'a> {
    pub result: Result<PemBlock>,
    pub rest: &'a [u8],
}

impl<'a> DecryptOutcome<'a> {
    pub fn into_parts(self) -> (Result<PemBlock>, &'a [u8]) {
        (self.result, self.rest)
    }
}

/// Decrypt the first PEM block in `input` with a single known password.
///
/// A wrong password fails immediately with [`ErrorKind::IncorrectPassword`].
pub fn decrypt_bytes_with_password<'a>(input: &'a [u8], password: &str) -> DecryptOutcome<'a> {
    let (mut block, rest) = match locate(input) {
        Ok(found) => found,
        Err(e) => return DecryptOutcome { result: Err(e), rest: input },
    };
    if !legacy::is_encrypted(&block) {
        return DecryptOutcome {
            result: Ok(block),
            rest,
        };
    }

    let result = match try_password(&mut block, password.as_bytes()) {
        Ok(true) => Ok(block),
        Ok(false) => Err(incorrect_password()),
        Err(e) => Err(e),
    };
    DecryptOutcome { result, rest }
}

/// Decrypt the first PEM block in `input`, asking `source` for passwords.
///
/// Wrong passwords are retried until `policy.max_tries` attempts have been
/// made (forever when it is zero), sleeping `policy.password_delay` before
/// each attempt. A failing password source, or a block that cannot be
/// decrypted at all, ends the call immediately.
pub fn decrypt_bytes<'a, S>(
    input: &'a [u8],
    source: &mut S,
    policy: &DecryptionPolicy,
) -> DecryptOutcome<'a>
where
    S: PasswordSource + ?Sized,
{
    let (mut block, rest) = match locate(input) {
        Ok(found) => found,
        Err(e) => return DecryptOutcome { result: Err(e), rest: input },
    };
    if !legacy::is_encrypted(&block) {
        tracing::debug!(label = %block.label, "PEM block is not encrypted, no password needed");
        return DecryptOutcome {
            result: Ok(block),
            rest,
        };
    }

    let result = retry_passwords(&mut block, source, policy).map(|()| block);
    DecryptOutcome { result, rest }
}

fn retry_passwords<S>(block: &mut PemBlock, source: &mut S, policy: &DecryptionPolicy) -> Result<()>
where
    S: PasswordSource + ?Sized,
{
    let mut attempts: u32 = 1;
    loop {
        if !policy.password_delay.is_zero() {
            thread::sleep(policy.password_delay);
        }

        let password = source.next_password()?;
        tracing::debug!(attempt = attempts, label = %block.label, "trying password");
        if try_password(block, password.as_bytes())? {
            return Ok(());
        }

        if policy.exhausted(attempts) {
            tracing::warn!(attempts, "incorrect password, no attempts left");
            return Err(incorrect_password());
        }
        tracing::warn!(attempt = attempts, "incorrect password, retrying");
        attempts = attempts.saturating_add(1);
        source.report_incorrect();
    }
}

/// Decrypt `block` in place. `Ok(false)` means the password was wrong and
/// the block is untouched.
fn try_password(block: &mut PemBlock, password: &[u8]) -> Result<bool> {
    match legacy::decrypt(block, password) {
        Decrypted::Plaintext(plaintext) => {
            legacy::strip_encryption_headers(block);
            block.bytes = plaintext;
            tracing::debug!(label = %block.label, "decrypted PEM block");
            Ok(true)
        }
        Decrypted::WrongPassword => Ok(false),
        Decrypted::Failed(e) => Err(e.with_context("cannot decrypt PEM block")),
    }
}

fn locate(input: &[u8]) -> Result<(PemBlock, &[u8])> {
    let (block, rest) = pem::decode(input).ok_or_else(|| {
        DecryptPemError::new(
            ErrorCategory::User,
            ErrorKind::NoBlockFound,
            "no PEM block found",
        )
    })?;
    tracing::debug!(label = %block.label, headers = block.headers.len(), "located PEM block");
    Ok((block, rest))
}

fn incorrect_password() -> DecryptPemError {
    DecryptPemError::new(
        ErrorCategory::User,
        ErrorKind::IncorrectPassword,
        "incorrect password",
    )
}
