//! Error types for envcrypt.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification used for exit codes and batch reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad flags or arguments. Reported before anything is touched.
    Configuration,
    /// Something the operation needs is missing (tool, files, a prompt).
    Precondition,
    /// The external encryption tool exited unsuccessfully.
    ToolInvocation,
    Io,
    Cancelled,
}

/// Detailed reason an environment name was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameIssue {
    Empty,
    TooLong { length: usize, maximum: usize },
    MustStartWithLetter { character: char },
    InvalidCharacter { character: char, position: usize },
    Reserved,
}

/// Rejected environment name with the position of the offending character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentNameError {
    pub input: String,
    pub issue: NameIssue,
}

impl EnvironmentNameError {
    pub fn new(input: impl Into<String>, issue: NameIssue) -> Self {
        Self {
            input: input.into(),
            issue,
        }
    }
}

impl fmt::Display for EnvironmentNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid environment name '{}': ", self.input)?;
        match &self.issue {
            NameIssue::Empty => write!(f, "name is empty"),
            NameIssue::TooLong { length, maximum } => {
                write!(f, "{length} characters (maximum {maximum})")
            }
            NameIssue::MustStartWithLetter { character } => {
                write!(f, "must start with a letter, found '{character}'")
            }
            NameIssue::InvalidCharacter {
                character,
                position,
            } => write!(
                f,
                "invalid character '{character}' at position {position} \
                 (allowed: letters, digits, '-' and '_')"
            ),
            NameIssue::Reserved => write!(f, "name is reserved for templates"),
        }
    }
}

impl std::error::Error for EnvironmentNameError {}

/// Main error type for envcrypt operations.
#[derive(Error, Debug)]
pub enum EnvcryptError {
    #[error("Conflicting options: {0}")]
    ConflictingFlags(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("{0}")]
    InvalidEnvironment(#[from] EnvironmentNameError),

    #[error("Cannot copy {environment} onto its own file {destination}")]
    InvalidDestination {
        destination: String,
        environment: String,
    },

    #[error("{tool} is not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("No environment files found in {0}")]
    NoEnvironments(PathBuf),

    #[error("No plaintext file for {environment}: {} does not exist", .path.display())]
    NoPlaintext { environment: String, path: PathBuf },

    #[error("No encrypted file for {environment}: {} does not exist", .path.display())]
    NoCiphertext { environment: String, path: PathBuf },

    #[error("Cannot prompt without an interactive terminal: {0}")]
    PromptUnavailable(String),

    #[error("Existing ciphertext for {0} does not decrypt with this passphrase (use --yes to re-encrypt anyway)")]
    PassphraseMismatch(String),

    #[error("{tool} {operation} failed: {stderr}")]
    ToolInvocation {
        tool: String,
        operation: String,
        stderr: String,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("{failed} of {total} item(s) failed")]
    BatchFailed { failed: usize, total: usize },

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnvcryptError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConflictingFlags(_)
            | Self::MissingArgument(_)
            | Self::InvalidEnvironment(_)
            | Self::InvalidDestination { .. } => ErrorKind::Configuration,
            Self::ToolUnavailable { .. }
            | Self::NoEnvironments(_)
            | Self::NoPlaintext { .. }
            | Self::NoCiphertext { .. }
            | Self::PromptUnavailable(_)
            | Self::PassphraseMismatch(_)
            | Self::FileExists(_)
            | Self::BatchFailed { .. } => ErrorKind::Precondition,
            Self::ToolInvocation { .. } => ErrorKind::ToolInvocation,
            Self::Io(_) | Self::Walk(_) | Self::Json(_) | Self::Prompt(_) => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            _ => 1,
        }
    }
}

impl From<dialoguer::Error> for EnvcryptError {
    fn from(err: dialoguer::Error) -> Self {
        EnvcryptError::Prompt(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EnvcryptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_exit_with_two() {
        let err = EnvcryptError::ConflictingFlags("--all and --env".to_string());
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_tool_errors_carry_stderr() {
        let err = EnvcryptError::ToolInvocation {
            tool: "gpg".to_string(),
            operation: "decrypt".to_string(),
            stderr: "bad passphrase".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ToolInvocation);
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("bad passphrase"));
    }

    #[test]
    fn test_name_error_message() {
        let err = EnvironmentNameError::new(
            "prod!",
            NameIssue::InvalidCharacter {
                character: '!',
                position: 5,
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("prod!"));
        assert!(msg.contains("position 5"));
    }
}
