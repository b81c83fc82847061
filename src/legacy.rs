//! Legacy OpenSSL PEM encryption (`Proc-Type: 4,ENCRYPTED` / `DEK-Info`)
//!
//! The key is derived with OpenSSL's `EVP_BytesToKey` using MD5, a single
//! iteration, and the first 8 bytes of the IV as salt. The payload is
//! CBC-encrypted with PKCS#7 padding. A padding mismatch after decryption
//! is how a wrong password shows up; every other problem is a malformed
//! or unsupported block.

use crate::error::{DecryptPemError, ErrorCategory, ErrorKind};
use crate::pem::PemBlock;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit};
use md5::{Digest, Md5};
use zeroize::Zeroizing;

pub const PROC_TYPE: &str = "Proc-Type";
pub const DEK_INFO: &str = "DEK-Info";

/// Length of the salt taken from the front of the IV.
const SALT_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Des,
    TripleDes,
    Aes128,
    Aes192,
    Aes256,
}

#[derive(Debug, Clone, Copy)]
struct Cipher {
    name: &'static str,
    algorithm: Algorithm,
    key_len: usize,
    block_size: usize,
}

const CIPHERS: &[Cipher] = &[
    Cipher {
        name: "DES-CBC",
        algorithm: Algorithm::Des,
        key_len: 8,
        block_size: 8,
    },
    Cipher {
        name: "DES-EDE3-CBC",
        algorithm: Algorithm::TripleDes,
        key_len: 24,
        block_size: 8,
    },
    Cipher {
        name: "AES-128-CBC",
        algorithm: Algorithm::Aes128,
        key_len: 16,
        block_size: 16,
    },
    Cipher {
        name: "AES-192-CBC",
        algorithm: Algorithm::Aes192,
        key_len: 24,
        block_size: 16,
    },
    Cipher {
        name: "AES-256-CBC",
        algorithm: Algorithm::Aes256,
        key_len: 32,
        block_size: 16,
    },
];

/// Outcome of one decryption attempt.
#[derive(Debug)]
pub enum Decrypted {
    /// The password was right; the payload is the plaintext.
    Plaintext(Vec<u8>),
    /// Decryption ran but the padding did not check out.
    WrongPassword,
    /// The block cannot be decrypted with any password.
    Failed(DecryptPemError),
}

/// Whether the block carries legacy encryption headers.
pub fn is_encrypted(block: &PemBlock) -> bool {
    block.headers.contains_key(DEK_INFO)
}

/// Remove the legacy encryption headers from a block.
pub fn strip_encryption_headers(block: &mut PemBlock) {
    block.headers.remove(PROC_TYPE);
    block.headers.remove(DEK_INFO);
}

/// Attempt to decrypt an encrypted block's payload with `password`.
///
/// The block itself is left unmodified.
pub fn decrypt(block: &PemBlock, password: &[u8]) -> Decrypted {
    let Some(dek_info) = block.headers.get(DEK_INFO) else {
        return Decrypted::Failed(malformed("no DEK-Info header in block"));
    };
    let Some((mode, hex_iv)) = dek_info.split_once(',') else {
        return Decrypted::Failed(malformed("malformed DEK-Info header"));
    };
    let mode = mode.trim();
    let Some(cipher) = CIPHERS.iter().find(|c| c.name == mode) else {
        return Decrypted::Failed(malformed(format!("unknown encryption mode {}", mode)));
    };

    let iv = match hex::decode(hex_iv.trim()) {
        Ok(iv) => iv,
        Err(e) => {
            return Decrypted::Failed(DecryptPemError::with_source(
                ErrorCategory::User,
                ErrorKind::DecryptBlockFailed,
                "malformed IV in DEK-Info header",
                e,
            ));
        }
    };
    if iv.len() != cipher.block_size {
        return Decrypted::Failed(malformed(format!(
            "incorrect IV size: expected {} bytes, got {}",
            cipher.block_size,
            iv.len()
        )));
    }

    if block.bytes.is_empty() {
        return Decrypted::Failed(malformed("encrypted PEM data is empty"));
    }
    if block.bytes.len() % cipher.block_size != 0 {
        return Decrypted::Failed(malformed(
            "encrypted PEM data is not a multiple of the block size",
        ));
    }

    let key = derive_key(password, &iv[..SALT_LEN], cipher.key_len);
    let mut buf = Zeroizing::new(block.bytes.clone());
    let result = match cipher.algorithm {
        Algorithm::Des => cbc_decrypt::<des::Des>(&key, &iv, &mut buf),
        Algorithm::TripleDes => cbc_decrypt::<des::TdesEde3>(&key, &iv, &mut buf),
        Algorithm::Aes128 => cbc_decrypt::<aes::Aes128>(&key, &iv, &mut buf),
        Algorithm::Aes192 => cbc_decrypt::<aes::Aes192>(&key, &iv, &mut buf),
        Algorithm::Aes256 => cbc_decrypt::<aes::Aes256>(&key, &iv, &mut buf),
    };

    match result {
        Ok(Some(len)) => Decrypted::Plaintext(buf[..len].to_vec()),
        Ok(None) => Decrypted::WrongPassword,
        Err(e) => Decrypted::Failed(e),
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and one iteration.
fn derive_key(password: &[u8], salt: &[u8], key_len: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(Vec::with_capacity(key_len));
    let mut digest = Zeroizing::new(Vec::new());
    while key.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(&*digest);
        hasher.update(password);
        hasher.update(salt);
        let out = hasher.finalize();
        digest.clear();
        digest.extend_from_slice(&out);
        key.extend_from_slice(&digest);
    }
    key.truncate(key_len);
    key
}

/// Decrypt `buf` in place. `Ok(None)` means the padding was invalid.
fn cbc_decrypt<C>(
    key: &[u8],
    iv: &[u8],
    buf: &mut [u8],
) -> Result<Option<usize>, DecryptPemError>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv).map_err(|_| {
        DecryptPemError::new(
            ErrorCategory::Internal,
            ErrorKind::DecryptBlockFailed,
            "invalid key or IV length for cipher",
        )
    })?;
    match decryptor.decrypt_padded_mut::<Pkcs7>(buf) {
        Ok(plaintext) => Ok(Some(plaintext.len())),
        Err(_) => Ok(None),
    }
}

fn malformed(msg: impl Into<String>) -> DecryptPemError {
    DecryptPemError::new(ErrorCategory::User, ErrorKind::DecryptBlockFailed, msg)
}
