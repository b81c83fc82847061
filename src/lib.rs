//! decryptpem - decrypt password-protected PEM blocks
//!
//! Finds the first PEM block in some input and, if it carries legacy
//! OpenSSL encryption headers (`Proc-Type: 4,ENCRYPTED` / `DEK-Info`),
//! decrypts it with a known password or by prompting on the terminal.
//! Unencrypted blocks are returned as-is without asking for a password.
//!
//! ```no_run
//! use std::path::Path;
//! use decryptpem::{DecryptionPolicy, file_ops};
//!
//! // Prompts only if the key is encrypted; gives up after three attempts.
//! let policy = DecryptionPolicy::new().with_max_tries(3);
//! let block = file_ops::decrypt_file_with_prompt(Path::new("/path/to/key.pem"), &policy)?;
//! println!("{}: {} bytes of DER", block.label, block.bytes.len());
//! # Ok::<(), decryptpem::DecryptPemError>(())
//! ```
//!
//! Parsing the decrypted DER (PKCS#1, PKCS#8, ...) is left to the caller.

#![forbid(unsafe_code)]

pub mod decrypt;
pub mod error;
pub mod file_ops;
pub mod legacy;
pub mod password;
pub mod pem;
pub mod policy;

pub use decrypt::{DecryptOutcome, decrypt_bytes, decrypt_bytes_with_password};
pub use error::{DecryptPemError, ErrorCategory, ErrorKind, Result};
pub use pem::PemBlock;
pub use policy::DecryptionPolicy;
