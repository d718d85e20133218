//! Runtime configuration assembled from flags and environment variables.

use crate::secrets::DEFAULT_SECRETS_FILE;
use crate::utils;
use std::path::{Path, PathBuf};

/// Default encryption program.
pub const DEFAULT_GPG_PROGRAM: &str = "gpg";

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the `.env.*` files (or the walk root when recursive).
    pub working_dir: PathBuf,
    /// Secrets file; relative paths resolve against `working_dir`.
    pub secrets_file: PathBuf,
    pub gpg_program: String,
    pub quiet: bool,
    /// Whether prompts can be shown.
    pub interactive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            secrets_file: PathBuf::from(DEFAULT_SECRETS_FILE),
            gpg_program: DEFAULT_GPG_PROGRAM.to_string(),
            quiet: false,
            interactive: utils::is_interactive_terminal(),
        }
    }
}

impl Config {
    /// Absolute-or-relative path of the secrets file.
    pub fn secrets_path(&self) -> PathBuf {
        resolve_against(&self.working_dir, &self.secrets_file)
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
