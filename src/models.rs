//! Data models for environment files and per-file operation state.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension appended to an environment file once encrypted.
pub const CIPHERTEXT_EXTENSION: &str = "gpg";

/// Environment tokens that name templates rather than deployable stages.
pub const RESERVED_ENVIRONMENTS: &[&str] = &["example", "template"];

/// A located candidate file for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvFile {
    pub path: PathBuf,
    pub environment: String,
    pub encrypted: bool,
    pub exists: bool,
}

impl EnvFile {
    fn candidate(dir: &Path, environment: &str, encrypted: bool) -> Self {
        let file_name = if encrypted {
            format!(".env.{environment}.{CIPHERTEXT_EXTENSION}")
        } else {
            format!(".env.{environment}")
        };
        let path = dir.join(file_name);
        let exists = path.is_file();
        Self {
            path,
            environment: environment.to_string(),
            encrypted,
            exists,
        }
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// The plaintext and ciphertext candidates for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvFilePair {
    pub plaintext: EnvFile,
    pub ciphertext: EnvFile,
}

impl EnvFilePair {
    /// Locate both candidates in `dir`. The name is lowercased for lookup.
    pub fn locate(dir: &Path, environment: &str) -> Self {
        let environment = environment.to_lowercase();
        Self {
            plaintext: EnvFile::candidate(dir, &environment, false),
            ciphertext: EnvFile::candidate(dir, &environment, true),
        }
    }

    pub fn environment(&self) -> &str {
        &self.plaintext.environment
    }
}

/// One unit of batch work: an environment within a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub directory: PathBuf,
    pub environment: String,
    /// Directory label shown in multi-directory mode.
    pub label: Option<String>,
}

impl Target {
    pub fn new(directory: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            environment: environment.into(),
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn files(&self) -> EnvFilePair {
        EnvFilePair::locate(&self.directory, &self.environment)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label}/{}", self.environment),
            None => write!(f, "{}", self.environment),
        }
    }
}

/// Lifecycle of a single file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Pending,
    TestingPassphrase,
    Ready,
    Invoking,
    Succeeded,
    /// Nothing to do; the existing output already matches.
    Skipped,
    Failed,
    /// Failed, and the pre-operation backup was put back.
    Restored,
}

impl FileState {
    pub fn is_success(self) -> bool {
        matches!(self, FileState::Succeeded | FileState::Skipped)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::Pending => "pending",
            FileState::TestingPassphrase => "testing passphrase",
            FileState::Ready => "ready",
            FileState::Invoking => "invoking",
            FileState::Succeeded => "succeeded",
            FileState::Skipped => "skipped",
            FileState::Failed => "failed",
            FileState::Restored => "restored",
        };
        f.write_str(s)
    }
}

/// Final result of an operation on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub state: FileState,
}

impl FileOutcome {
    /// Number of files written by the operation.
    pub fn files_processed(&self) -> usize {
        usize::from(self.state == FileState::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_builds_both_candidates() {
        let pair = EnvFilePair::locate(Path::new("/work"), "Production");
        assert_eq!(pair.environment(), "production");
        assert_eq!(pair.plaintext.path, PathBuf::from("/work/.env.production"));
        assert_eq!(
            pair.ciphertext.path,
            PathBuf::from("/work/.env.production.gpg")
        );
        assert!(!pair.plaintext.encrypted);
        assert!(pair.ciphertext.encrypted);
        assert!(!pair.plaintext.exists);
    }

    #[test]
    fn test_target_display() {
        let target = Target::new("/work/api", "staging");
        assert_eq!(target.to_string(), "staging");
        assert_eq!(target.labelled("api").to_string(), "api/staging");
    }

    #[test]
    fn test_skipped_counts_as_success_without_files() {
        let outcome = FileOutcome {
            path: PathBuf::from(".env.dev.gpg"),
            state: FileState::Skipped,
        };
        assert!(outcome.state.is_success());
        assert_eq!(outcome.files_processed(), 0);
    }
}
