//! File encryption/decryption operations
//!
//! This module provides the high-level operations the CLI drives: read a
//! file, seal or open it with a password from a `PasswordReader`, pick the
//! output path, and write the result. The original file extension is taken
//! from the input filename on encryption and recovered from the container
//! on decryption.

use crate::container;
use crate::error::{CryptextError, ErrorCategory, ErrorKind, Result};
use crate::passphrase::PasswordReader;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

/// Extension given to encrypted containers when no output path is supplied.
/// Cosmetic only; decryption does not depend on it.
pub const CONTAINER_EXTENSION: &str = ".enc";

/// What to do when the user-supplied output path carries a different
/// extension than the one recovered from the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchChoice {
    /// Keep the output path exactly as the user supplied it.
    KeepProvided,
    /// Swap the output path's extension for the recovered one.
    UseRecovered,
    /// Write nothing and stop.
    Abort,
}

/// Decides how to resolve an output-extension mismatch on decryption.
pub trait MismatchPrompt {
    fn resolve(&mut self, provided: &str, recovered: &str) -> Result<MismatchChoice>;
}

/// Always answers with a fixed choice (for testing and non-interactive use)
pub struct ConstantMismatchPrompt {
    choice: MismatchChoice,
}

impl ConstantMismatchPrompt {
    pub fn new(choice: MismatchChoice) -> Self {
        Self { choice }
    }
}

impl MismatchPrompt for ConstantMismatchPrompt {
    fn resolve(&mut self, _provided: &str, _recovered: &str) -> Result<MismatchChoice> {
        Ok(self.choice)
    }
}

/// Asks the user on the terminal how to resolve the mismatch.
///
/// When stdin is not a terminal the provided path is kept as-is, so
/// scripted invocations never block on a prompt.
pub struct TerminalMismatchPrompt;

impl MismatchPrompt for TerminalMismatchPrompt {
    fn resolve(&mut self, provided: &str, recovered: &str) -> Result<MismatchChoice> {
        if !io::stdin().is_terminal() {
            return Ok(MismatchChoice::KeepProvided);
        }

        eprintln!(
            "Extension of the output path ({}) doesn't match the original file extension ({})",
            display_extension(provided),
            display_extension(recovered),
        );
        eprint!("Continue [y], use the original extension [C], or abort [n]? ");
        io::stderr().flush().map_err(|e| {
            CryptextError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to flush prompt",
                e,
            )
        })?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer).map_err(|e| {
            CryptextError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to read answer",
                e,
            )
        })?;

        Ok(match answer.trim() {
            "y" | "Y" => MismatchChoice::KeepProvided,
            "n" | "N" => MismatchChoice::Abort,
            _ => MismatchChoice::UseRecovered,
        })
    }
}

fn display_extension(extension: &str) -> &str {
    if extension.is_empty() { "none" } else { extension }
}

/// Encrypt a file with a password
///
/// Reads plaintext from `input_path`, seals it together with the input
/// file's extension using a password from `password_reader`, and writes
/// the container to `output_path` (or, when `None`, to the input path
/// with its extension replaced by `.enc`).
///
/// The output file is created with mode 0o600 (read/write for owner only)
/// on Unix systems. Returns the path written to.
pub fn encrypt_file(
    input_path: &Path,
    output_path: Option<&Path>,
    password_reader: &mut dyn PasswordReader,
) -> Result<PathBuf> {
    let plaintext = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let extension = path_extension(input_path);
    let password = password_reader.read_password()?;

    let container = container::seal(&password, &plaintext, &extension)
        .map_err(|e| e.with_context("encryption failed"))?;

    let out = match output_path {
        Some(p) => p.to_path_buf(),
        None => replace_extension(input_path, CONTAINER_EXTENSION),
    };
    write_file_secure(&out, &container)
        .map_err(|e| e.with_context(format!("failed to write to {}", out.display())))?;

    Ok(out)
}

/// Decrypt a file with a password
///
/// Reads a container from `input_path`, opens it using a password from
/// `password_reader`, and writes the recovered plaintext. When no output
/// path is supplied the input path gets its extension replaced by the one
/// recovered from the container. When the supplied output path carries a
/// different extension than the recovered one, `mismatch_prompt` decides
/// whether to keep it, fix it, or abort.
///
/// Returns the path written to, or `None` when the prompt chose to abort.
pub fn decrypt_file(
    input_path: &Path,
    output_path: Option<&Path>,
    password_reader: &mut dyn PasswordReader,
    mismatch_prompt: &mut dyn MismatchPrompt,
) -> Result<Option<PathBuf>> {
    let container = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let password = password_reader.read_password()?;

    let (plaintext, extension) = container::open(&password, &container)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    let out = match output_path {
        Some(p) => {
            let provided = path_extension(p);
            if provided == extension {
                p.to_path_buf()
            } else {
                match mismatch_prompt.resolve(&provided, &extension)? {
                    MismatchChoice::KeepProvided => p.to_path_buf(),
                    MismatchChoice::UseRecovered => replace_extension(p, &extension),
                    MismatchChoice::Abort => return Ok(None),
                }
            }
        }
        None => replace_extension(input_path, &extension),
    };

    write_file_secure(&out, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", out.display())))?;

    Ok(Some(out))
}

/// The input file's extension with its leading dot, or an empty string
/// when the filename has none (or it is not valid UTF-8).
fn path_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{}", ext),
        None => String::new(),
    }
}

/// Replace the path's extension with `new_ext` (leading dot included,
/// empty to strip the extension entirely).
fn replace_extension(path: &Path, new_ext: &str) -> PathBuf {
    let mut stripped = path.to_path_buf();
    stripped.set_extension("");
    let mut name = stripped.into_os_string();
    name.push(new_ext);
    PathBuf::from(name)
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                CryptextError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            CryptextError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            CryptextError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> CryptextError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    CryptextError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::passphrase::ConstantPasswordReader;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn keep_provided() -> ConstantMismatchPrompt {
        ConstantMismatchPrompt::new(MismatchChoice::KeepProvided)
    }

    #[test]
    fn test_roundtrip_restores_extension() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("notes.txt");

        let plaintext = b"Hello, cryptext!";
        fs::write(&plain_path, plaintext).unwrap();

        let mut reader = ConstantPasswordReader::new(b"test password".to_vec());
        let crypt_path = encrypt_file(&plain_path, None, &mut reader).unwrap();
        assert_eq!(crypt_path, temp_dir.path().join("notes.enc"));
        assert!(crypt_path.exists());

        // Remove the original so decryption's default output recreates it
        fs::remove_file(&plain_path).unwrap();

        let mut reader = ConstantPasswordReader::new(b"test password".to_vec());
        let restored = decrypt_file(&crypt_path, None, &mut reader, &mut keep_provided())
            .unwrap()
            .expect("expected a file to be written");

        assert_eq!(restored, plain_path);
        assert_eq!(fs::read(&restored).unwrap(), plaintext);
    }

    #[test]
    fn test_explicit_output_paths() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("data.csv");
        let crypt_path = temp_dir.path().join("vault.bin");
        let out_path = temp_dir.path().join("restored.csv");

        fs::write(&plain_path, b"a,b,c").unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        let written = encrypt_file(&plain_path, Some(&crypt_path), &mut reader).unwrap();
        assert_eq!(written, crypt_path);

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        let restored = decrypt_file(&crypt_path, Some(&out_path), &mut reader, &mut keep_provided())
            .unwrap()
            .unwrap();

        assert_eq!(restored, out_path);
        assert_eq!(fs::read(&out_path).unwrap(), b"a,b,c");
    }

    #[test]
    fn test_mismatch_use_recovered() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("doc.txt");
        let crypt_path = temp_dir.path().join("doc.enc");
        let wrong_out = temp_dir.path().join("restored.md");

        fs::write(&plain_path, b"text").unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        encrypt_file(&plain_path, Some(&crypt_path), &mut reader).unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        let mut prompt = ConstantMismatchPrompt::new(MismatchChoice::UseRecovered);
        let restored = decrypt_file(&crypt_path, Some(&wrong_out), &mut reader, &mut prompt)
            .unwrap()
            .unwrap();

        assert_eq!(restored, temp_dir.path().join("restored.txt"));
        assert_eq!(fs::read(&restored).unwrap(), b"text");
    }

    #[test]
    fn test_mismatch_abort_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("doc.txt");
        let crypt_path = temp_dir.path().join("doc.enc");
        let wrong_out = temp_dir.path().join("restored.md");

        fs::write(&plain_path, b"text").unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        encrypt_file(&plain_path, Some(&crypt_path), &mut reader).unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        let mut prompt = ConstantMismatchPrompt::new(MismatchChoice::Abort);
        let result = decrypt_file(&crypt_path, Some(&wrong_out), &mut reader, &mut prompt).unwrap();

        assert_eq!(result, None);
        assert!(!wrong_out.exists());
    }

    #[test]
    fn test_matching_extension_skips_prompt() {
        struct PanickingPrompt;
        impl MismatchPrompt for PanickingPrompt {
            fn resolve(&mut self, _: &str, _: &str) -> Result<MismatchChoice> {
                panic!("prompt must not be consulted when extensions match");
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("doc.txt");
        let crypt_path = temp_dir.path().join("doc.enc");
        let out_path = temp_dir.path().join("restored.txt");

        fs::write(&plain_path, b"text").unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        encrypt_file(&plain_path, Some(&crypt_path), &mut reader).unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        let restored = decrypt_file(&crypt_path, Some(&out_path), &mut reader, &mut PanickingPrompt)
            .unwrap()
            .unwrap();
        assert_eq!(restored, out_path);
    }

    #[test]
    fn test_file_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("README");

        fs::write(&plain_path, b"plain readme").unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        let crypt_path = encrypt_file(&plain_path, None, &mut reader).unwrap();
        assert_eq!(crypt_path, temp_dir.path().join("README.enc"));

        fs::remove_file(&plain_path).unwrap();

        let mut reader = ConstantPasswordReader::new(b"pw".to_vec());
        let restored = decrypt_file(&crypt_path, None, &mut reader, &mut keep_provided())
            .unwrap()
            .unwrap();

        assert_eq!(restored, plain_path);
        assert_eq!(fs::read(&restored).unwrap(), b"plain readme");
    }

    #[test]
    fn test_decrypt_wrong_password() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");

        fs::write(&plain_path, b"secret").unwrap();

        let mut reader = ConstantPasswordReader::new(b"correct".to_vec());
        let crypt_path = encrypt_file(&plain_path, None, &mut reader).unwrap();

        let mut reader = ConstantPasswordReader::new(b"wrong".to_vec());
        let result = decrypt_file(&crypt_path, None, &mut reader, &mut keep_provided());

        let err = result.expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");

        fs::write(&plain_path, b"test").unwrap();

        let mut reader = ConstantPasswordReader::new(b"test".to_vec());
        let crypt_path = encrypt_file(&plain_path, None, &mut reader).unwrap();

        let metadata = fs::metadata(&crypt_path).unwrap();
        let permissions = metadata.permissions();
        assert_eq!(permissions.mode() & 0o777, 0o600);
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("empty.txt");

        fs::write(&plain_path, b"").unwrap();

        let mut reader = ConstantPasswordReader::new(b"test".to_vec());
        let crypt_path = encrypt_file(&plain_path, None, &mut reader).unwrap();

        fs::remove_file(&plain_path).unwrap();

        let mut reader = ConstantPasswordReader::new(b"test".to_vec());
        let restored = decrypt_file(&crypt_path, None, &mut reader, &mut keep_provided())
            .unwrap()
            .unwrap();

        assert_eq!(fs::read(&restored).unwrap(), b"");
    }

    #[test]
    fn test_path_extension() {
        assert_eq!(path_extension(Path::new("a/b/file.txt")), ".txt");
        assert_eq!(path_extension(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(path_extension(Path::new("README")), "");
        assert_eq!(path_extension(Path::new(".gitignore")), "");
    }

    #[test]
    fn test_replace_extension() {
        assert_eq!(
            replace_extension(Path::new("a/b/file.txt"), ".enc"),
            Path::new("a/b/file.enc")
        );
        assert_eq!(
            replace_extension(Path::new("file.enc"), ".txt"),
            Path::new("file.txt")
        );
        assert_eq!(
            replace_extension(Path::new("file.enc"), ""),
            Path::new("file")
        );
        assert_eq!(
            replace_extension(Path::new("README"), ".enc"),
            Path::new("README.enc")
        );
    }
}
