//! Cryptext - Password-based file encryption that preserves the original
//! file extension
//!
//! Files are sealed with AES-256-GCM under a key derived from the password
//! with scrypt. The original extension travels inside the authenticated
//! payload, so decryption can restore the file exactly as it was.

#![forbid(unsafe_code)]

pub mod container;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
