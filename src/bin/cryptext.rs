//! Cryptext CLI - Password-based file encryption
//!
//! Command-line interface for encrypting and decrypting single files using
//! AES-256-GCM with scrypt key derivation. The original file extension is
//! stored inside the encrypted container and restored on decryption.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use cryptext::file_ops::{self, TerminalMismatchPrompt};
use cryptext::passphrase::{PasswordReader, StdinPasswordReader, TerminalPasswordReader};

#[derive(Parser)]
#[command(name = "cryptext")]
#[command(version)]
#[command(about = "Password-based file encryption.", long_about = None)]
struct Cli {
    /// Read password from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the encrypted container to. Defaults to the
        /// input path with its extension replaced by .enc
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the encrypted container
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the decrypted file to. Defaults to the input
        /// path with the original extension restored
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encrypt { input, output } => {
            let mut reader = get_password_reader(cli.passphrase_stdin);
            file_ops::encrypt_file(&input, output.as_deref(), &mut *reader).map(Some)
        }
        Commands::Decrypt { input, output } => {
            let mut reader = get_password_reader(cli.passphrase_stdin);
            file_ops::decrypt_file(
                &input,
                output.as_deref(),
                &mut *reader,
                &mut TerminalMismatchPrompt,
            )
        }
    };

    match result {
        Ok(Some(_)) => {}
        Ok(None) => {
            // User chose to abort at the extension mismatch prompt
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn get_password_reader(use_stdin: bool) -> Box<dyn PasswordReader> {
    if use_stdin {
        Box::new(StdinPasswordReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPasswordReader)
    }
}
