use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example, due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input (a wrong password, a file that is
    /// not PEM, a missing file) or asked for something impossible.
    User,
}

/// Condition flags for consumers that want to branch on failure modes.
///
/// Kinds never overlap: a wrong password is always `IncorrectPassword`,
/// malformed or unsupported encrypted data is always `DecryptBlockFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No PEM-delimited block was located in the input.
    NoBlockFound,
    /// The block is encrypted but could not be decrypted for a reason
    /// other than a password mismatch (unknown cipher, bad IV, corrupt
    /// ciphertext).
    DecryptBlockFailed,
    /// The password did not decrypt the block. In the retrying flows this
    /// is only returned once the retry budget is exhausted.
    IncorrectPassword,
    /// Reading the input file failed, or it held no PEM block.
    FileReadFailed,
    /// A password could not be obtained (no terminal, read error, EOF).
    PasswordSourceFailed,
    /// Writing output or prompts failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct DecryptPemError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Specific condition tag.
    pub kind: ErrorKind,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl DecryptPemError {
    /// Creates a new error tagged with a kind.
    pub fn new(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving
    /// the original as source. The kind is unchanged.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let kind = self.kind;
        self.wrap(kind, msg)
    }

    /// Wraps the current error under a different kind, keeping the original
    /// (and its kind) reachable through the source chain.
    pub fn wrap(self, kind: ErrorKind, msg: impl Into<String>) -> Self {
        let category = self.category;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// True if this error, or any `DecryptPemError` in its source chain,
    /// carries `kind`.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        let mut current: Option<&DecryptPemError> = Some(self);
        while let Some(err) = current {
            if err.kind == kind {
                return true;
            }
            current = err
                .source
                .as_deref()
                .and_then(|s| s.downcast_ref::<DecryptPemError>());
        }
        false
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DecryptPemError>;
