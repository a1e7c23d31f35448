//! Encryption/decryption using scrypt + AES-256-GCM
//!
//! This module implements password-based encryption using:
//! - scrypt for key derivation from password (see `kdf`)
//! - AES-256-GCM for authenticated encryption
//!
//! The binary container format is:
//! - nonce: 12 bytes
//! - sealed payload: variable length (includes 16-byte GCM tag)
//! - salt: 32 bytes
//!
//! The sealed payload is the AEAD seal of the framed plaintext:
//! - extension length: 1 byte
//! - extension: that many bytes, leading dot included
//! - original file bytes: remainder
//!
//! The extension travels inside the sealed payload, so it is covered by
//! the authentication tag along with the file content.

use crate::error::{CryptextError, ErrorCategory, ErrorKind, Result};
use crate::kdf::{self, SALT_LEN};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::TryRngCore;
use rand::rngs::OsRng;

/// Length of the AES-GCM nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag appended to the sealed payload
pub const TAG_LEN: usize = 16;

/// Largest extension (in bytes, dot included) the one-byte length field can hold
pub const MAX_EXTENSION_LEN: usize = u8::MAX as usize;

/// Encrypt plaintext with a password using random salt and nonce.
///
/// The extension string (with leading dot, or empty if the source file has
/// none) is framed into the plaintext before sealing so that `open` can
/// recover it. Returns the binary container: nonce(12) + sealed(variable)
/// + salt(32).
pub fn seal(password: &[u8], plaintext: &[u8], extension: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.try_fill_bytes(&mut salt).map_err(|e| {
        CryptextError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InsufficientRandomness,
            "failed to read random bytes for salt",
            e,
        )
    })?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.try_fill_bytes(&mut nonce).map_err(|e| {
        CryptextError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InsufficientRandomness,
            "failed to read random bytes for nonce",
            e,
        )
    })?;

    seal_deterministic(password, plaintext, extension, &salt, &nonce)
}

/// Encrypt plaintext with a password using provided salt and nonce.
///
/// This function is ONLY for testing purposes to generate deterministic
/// output. NEVER use this in production - always use `seal()` which
/// generates random salt/nonce.
pub fn seal_deterministic(
    password: &[u8],
    plaintext: &[u8],
    extension: &str,
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let framed = encode_frame(extension, plaintext)?;

    let key = kdf::derive_key(password, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));

    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), framed.as_slice())
        .map_err(|_| {
            CryptextError::new(ErrorCategory::Internal, "AES-256-GCM sealing failed")
        })?;

    let mut container = Vec::with_capacity(NONCE_LEN + sealed.len() + SALT_LEN);
    container.extend_from_slice(nonce);
    container.extend_from_slice(&sealed);
    container.extend_from_slice(salt);

    Ok(container)
}

/// Decrypt a container with a password.
///
/// Returns the original file bytes together with the recovered extension.
/// A wrong password is indistinguishable from a corrupted or tampered-with
/// container; both surface as `ErrorKind::AuthenticationFailed` and no
/// partial plaintext is ever returned.
pub fn open(password: &[u8], container: &[u8]) -> Result<(Vec<u8>, String)> {
    if container.len() < SALT_LEN {
        return Err(CryptextError::with_kind(
            ErrorCategory::User,
            ErrorKind::ContainerTooShort,
            "input likely truncated while reading salt",
        ));
    }
    let (prefix, salt_bytes) = container.split_at(container.len() - SALT_LEN);
    let salt: [u8; SALT_LEN] = salt_bytes.try_into().map_err(|e| {
        CryptextError::with_source(ErrorCategory::Internal, "failed to read salt", e)
    })?;

    if prefix.len() < NONCE_LEN {
        return Err(CryptextError::with_kind(
            ErrorCategory::User,
            ErrorKind::ContainerTooShort,
            "input likely truncated while reading nonce",
        ));
    }
    let (nonce, sealed) = prefix.split_at(NONCE_LEN);

    let key = kdf::derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));

    let framed = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| {
            CryptextError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt input, tampered-with data, or bad password",
            )
        })?;

    decode_frame(&framed)
}

/// Frame the extension ahead of the plaintext: length byte, extension
/// bytes, then the file content.
///
/// The length byte stores the extension's byte length directly, so
/// extensions of 0 through 255 bytes are representable. Paired with
/// `decode_frame`; keep the two in sync.
fn encode_frame(extension: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    if extension.len() > MAX_EXTENSION_LEN {
        return Err(CryptextError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidExtension,
            format!(
                "file extension is {} bytes; the container format allows at most {}",
                extension.len(),
                MAX_EXTENSION_LEN
            ),
        ));
    }

    let mut framed = Vec::with_capacity(1 + extension.len() + plaintext.len());
    framed.push(extension.len() as u8);
    framed.extend_from_slice(extension.as_bytes());
    framed.extend_from_slice(plaintext);
    Ok(framed)
}

/// Split a framed plaintext back into file content and extension.
fn decode_frame(framed: &[u8]) -> Result<(Vec<u8>, String)> {
    let Some((&ext_len, rest)) = framed.split_first() else {
        return Err(CryptextError::with_kind(
            ErrorCategory::User,
            ErrorKind::ContainerTooShort,
            "sealed payload missing extension header",
        ));
    };
    let ext_len = ext_len as usize;

    if rest.len() < ext_len {
        return Err(CryptextError::with_kind(
            ErrorCategory::User,
            ErrorKind::ContainerTooShort,
            "sealed payload truncated while reading extension",
        ));
    }
    let (ext_bytes, content) = rest.split_at(ext_len);

    let extension = String::from_utf8(ext_bytes.to_vec()).map_err(|e| {
        CryptextError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InvalidExtension,
            "recovered extension is not valid UTF-8",
            e,
        )
    })?;

    Ok((content.to_vec(), extension))
}
