//! File-level decrypt operations
//!
//! These read a PEM file, decrypt its first block, and map storage problems
//! (including a file holding no PEM block at all) to
//! [`ErrorKind::FileReadFailed`]. Decryption failures keep their own kind.

use crate::decrypt::{decrypt_bytes, decrypt_bytes_with_password};
use crate::error::{DecryptPemError, ErrorCategory, ErrorKind, Result};
use crate::password::{PasswordSource, TerminalPrompt};
use crate::pem::{self, PemBlock};
use crate::policy::DecryptionPolicy;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Decrypt the first PEM block in `path` with a known password.
pub fn decrypt_file_with_password(path: &Path, password: &str) -> Result<PemBlock> {
    let content = fs::read(path).map_err(|e| read_error(path, e))?;
    let outcome = decrypt_bytes_with_password(&content, password);
    outcome.result.map_err(|e| file_error(path, e))
}

/// Decrypt the first PEM block in `path`, prompting on the terminal for the
/// password if the block is encrypted.
///
/// Unencrypted files never prompt, so this also works without a terminal.
pub fn decrypt_file_with_prompt(path: &Path, policy: &DecryptionPolicy) -> Result<PemBlock> {
    let mut prompt = TerminalPrompt::for_file(path);
    decrypt_file(path, &mut prompt, policy)
}

/// Decrypt the first PEM block in `path` with passwords from `source`.
pub fn decrypt_file<S>(path: &Path, source: &mut S, policy: &DecryptionPolicy) -> Result<PemBlock>
where
    S: PasswordSource + ?Sized,
{
    let content = fs::read(path).map_err(|e| read_error(path, e))?;
    let outcome = decrypt_bytes(&content, source, policy);
    outcome.result.map_err(|e| file_error(path, e))
}

/// Write a block to `path` in PEM form.
///
/// The file is written atomically (tempfile + fsync + rename) and, on Unix,
/// readable only by its owner.
pub fn write_pem_file(path: &Path, block: &PemBlock) -> Result<()> {
    let encoded = zeroize::Zeroizing::new(pem::encode(block));

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        DecryptPemError::with_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(encoded.as_bytes()).map_err(|e| {
        DecryptPemError::with_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        DecryptPemError::with_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        DecryptPemError::with_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
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
                DecryptPemError::with_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        DecryptPemError::with_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> DecryptPemError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    DecryptPemError::with_source(
        category,
        ErrorKind::FileReadFailed,
        format!("failed to read from {}", path.display()),
        err,
    )
}

fn file_error(path: &Path, err: DecryptPemError) -> DecryptPemError {
    if err.kind == ErrorKind::NoBlockFound {
        err.wrap(
            ErrorKind::FileReadFailed,
            format!("cannot read and decrypt {}", path.display()),
        )
    } else {
        err.with_context(format!("cannot decrypt {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::FixedPassword;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    const ENCRYPTED_RSA: &[u8] = include_bytes!("../testdata/encrypted_rsa.pem");
    const PLAINTEXT_RSA: &[u8] = include_bytes!("../testdata/plaintext_rsa.pem");

    #[test]
    fn test_decrypt_file_with_password() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.pem");
        fs::write(&path, ENCRYPTED_RSA).unwrap();

        let block = decrypt_file_with_password(&path, "foobar").unwrap();
        assert_eq!(block.bytes, pem::decode(PLAINTEXT_RSA).unwrap().0.bytes);
        assert!(block.headers.is_empty());
    }

    #[test]
    fn test_decrypt_file_wrong_password_keeps_kind() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.pem");
        fs::write(&path, ENCRYPTED_RSA).unwrap();

        let err = decrypt_file_with_password(&path, "badpass").expect_err("expected failure");
        assert_eq!(err.kind, ErrorKind::IncorrectPassword);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("does-not-exist.pem");

        let err = decrypt_file_with_password(&path, "foobar").expect_err("expected failure");
        assert_eq!(err.kind, ErrorKind::FileReadFailed);
        assert_eq!(err.category, ErrorCategory::User);
        assert!(!err.has_kind(ErrorKind::NoBlockFound));
    }

    #[test]
    fn test_file_without_block() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, b"not a key\n").unwrap();

        let err = decrypt_file_with_password(&path, "foobar").expect_err("expected failure");
        assert_eq!(err.kind, ErrorKind::FileReadFailed);
        assert!(err.has_kind(ErrorKind::NoBlockFound));

        let mut source = FixedPassword::new("foobar");
        let err = decrypt_file(&path, &mut source, &DecryptionPolicy::default())
            .expect_err("expected failure");
        assert_eq!(err.kind, ErrorKind::FileReadFailed);
        assert!(err.has_kind(ErrorKind::NoBlockFound));
    }

    #[test]
    fn test_decrypt_file_with_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.pem");
        fs::write(&path, ENCRYPTED_RSA).unwrap();

        let mut source = FixedPassword::new("foobar");
        let policy = DecryptionPolicy::new().with_max_tries(1);
        let block = decrypt_file(&path, &mut source, &policy).unwrap();
        assert_eq!(block.label, "RSA PRIVATE KEY");
        assert!(block.headers.is_empty());
    }

    #[test]
    fn test_prompt_not_used_for_plaintext_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.pem");
        fs::write(&path, PLAINTEXT_RSA).unwrap();

        let block = decrypt_file_with_prompt(&path, &DecryptionPolicy::default()).unwrap();
        assert_eq!(block, pem::decode(PLAINTEXT_RSA).unwrap().0);
    }

    #[test]
    fn test_write_pem_file() {
        let temp_dir = TempDir::new().unwrap();
        let in_path = temp_dir.path().join("key.pem");
        let out_path = temp_dir.path().join("decrypted.pem");
        fs::write(&in_path, ENCRYPTED_RSA).unwrap();

        let block = decrypt_file_with_password(&in_path, "foobar").unwrap();
        write_pem_file(&out_path, &block).unwrap();

        let written = fs::read(&out_path).unwrap();
        let (reread, rest) = pem::decode(&written).unwrap();
        assert_eq!(reread, block);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_write_pem_file_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let out_path = temp_dir.path().join("out.pem");
        fs::write(&out_path, b"old content").unwrap();

        let block = PemBlock::new("TEST", b"new".to_vec());
        write_pem_file(&out_path, &block).unwrap();

        let written = fs::read_to_string(&out_path).unwrap();
        assert_eq!(written, "-----BEGIN TEST-----\nbmV3\n-----END TEST-----\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_written_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let out_path = temp_dir.path().join("out.pem");

        write_pem_file(&out_path, &PemBlock::new("TEST", vec![1, 2, 3])).unwrap();

        let metadata = fs::metadata(&out_path).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }
}
