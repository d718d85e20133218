//! envcrypt: manage per-stage `.env.<environment>` files encrypted with GnuPG.

pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gpg;
pub mod models;
pub mod operations;
pub mod passphrase;
pub mod prompt;
pub mod reporter;
pub mod secrets;
pub mod secure_temp;
pub mod utils;

// Re-export commonly used types
pub use batch::{run_batch, BatchReport, BatchResult, BatchSummary};
pub use error::{EnvcryptError, ErrorKind, Result};
pub use gpg::{EncryptionTool, Gpg};
pub use models::{EnvFile, EnvFilePair, FileState, Target};
pub use operations::EnvOperations;
pub use prompt::Prompter;
