//! Utility functions shared by commands.

use crate::error::{EnvironmentNameError, NameIssue, Result};
use crate::models::RESERVED_ENVIRONMENTS;
use colored::*;
use std::fs;
use std::io::Write;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Maximum accepted environment name length.
pub const MAX_ENVIRONMENT_LENGTH: usize = 64;

fn is_valid_name_char(ch: char) -> bool {
    matches!(ch, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_')
}

/// Validate an environment name and return its lowercase form.
///
/// Names must start with a letter and contain only letters, digits, `-`
/// and `_`. Reserved template names are rejected.
pub fn validate_environment_name(name: &str) -> Result<String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(EnvironmentNameError::new(name, NameIssue::Empty).into());
    }

    let length = trimmed.chars().count();
    if length > MAX_ENVIRONMENT_LENGTH {
        return Err(EnvironmentNameError::new(
            trimmed,
            NameIssue::TooLong {
                length,
                maximum: MAX_ENVIRONMENT_LENGTH,
            },
        )
        .into());
    }

    for (index, ch) in trimmed.chars().enumerate() {
        if index == 0 && !ch.is_ascii_alphabetic() {
            return Err(EnvironmentNameError::new(
                trimmed,
                NameIssue::MustStartWithLetter { character: ch },
            )
            .into());
        }
        if !is_valid_name_char(ch) {
            return Err(EnvironmentNameError::new(
                trimmed,
                NameIssue::InvalidCharacter {
                    character: ch,
                    position: index + 1,
                },
            )
            .into());
        }
    }

    let normalized = trimmed.to_lowercase();
    if RESERVED_ENVIRONMENTS.contains(&normalized.as_str()) {
        return Err(EnvironmentNameError::new(trimmed, NameIssue::Reserved).into());
    }

    Ok(normalized)
}

/// Restrict a file to its owner (0600). No-op on non-unix platforms.
pub fn set_owner_only(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Write `contents` to `path`, creating the file as 0600 so it is never
/// readable by others, even briefly.
pub fn write_owner_only(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    // mode() only applies to newly created files
    set_owner_only(path)
}

/// Check file permissions and return warnings.
pub fn check_file_permissions(path: &Path) -> Vec<String> {
    let mut warnings = Vec::new();

    #[cfg(unix)]
    {
        if let Ok(metadata) = fs::metadata(path) {
            let mode = metadata.permissions().mode();

            // Group or others have access
            if mode & 0o077 != 0 {
                warnings.push(format!(
                    "{} has insecure permissions: {:o}. Run 'chmod 600 {}' to fix.",
                    path.display(),
                    mode & 0o777,
                    path.display()
                ));
            }
        }
    }

    warnings
}

/// Add `entry` to the `.gitignore` in `dir` if that file exists and does not
/// list it yet. Returns whether the file was changed.
pub fn ensure_gitignored(dir: &Path, entry: &str) -> Result<bool> {
    let gitignore = dir.join(".gitignore");
    if !gitignore.is_file() {
        return Ok(false);
    }

    let content = fs::read_to_string(&gitignore)?;
    let listed = content.lines().any(|line| {
        let line = line.trim();
        line == entry || line.trim_start_matches('/') == entry
    });
    if listed {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new().append(true).open(&gitignore)?;
    if !content.is_empty() && !content.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{entry}")?;
    Ok(true)
}

/// Whether both stdin and stdout are attached to a terminal.
pub fn is_interactive_terminal() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// Print an error message and exit.
pub fn error_exit(message: &str, code: i32) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message);
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnvcryptError;
    use tempfile::tempdir;

    #[test]
    fn test_validate_environment_name() {
        assert_eq!(validate_environment_name("production").unwrap(), "production");
        assert_eq!(validate_environment_name("QA-east_2").unwrap(), "qa-east_2");
        assert_eq!(validate_environment_name("  dev ").unwrap(), "dev");

        assert!(validate_environment_name("").is_err());
        assert!(validate_environment_name("2prod").is_err());
        assert!(validate_environment_name("-prod").is_err());
        assert!(validate_environment_name("prod.eu").is_err());
        assert!(validate_environment_name("example").is_err());
        assert!(validate_environment_name("Template").is_err());
        assert!(validate_environment_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_invalid_character_position() {
        match validate_environment_name("prod/eu") {
            Err(EnvcryptError::InvalidEnvironment(err)) => {
                assert_eq!(
                    err.issue,
                    NameIssue::InvalidCharacter {
                        character: '/',
                        position: 5
                    }
                );
            }
            other => panic!("expected InvalidEnvironment, got {other:?}"),
        }
    }

    #[test]
    fn test_ensure_gitignored() {
        let dir = tempdir().unwrap();
        assert!(!ensure_gitignored(dir.path(), ".envcrypt.secrets").unwrap());

        fs::write(dir.path().join(".gitignore"), "target").unwrap();
        assert!(ensure_gitignored(dir.path(), ".envcrypt.secrets").unwrap());
        assert!(!ensure_gitignored(dir.path(), ".envcrypt.secrets").unwrap());

        let content = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "target\n.envcrypt.secrets\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_owner_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env.dev");
        write_owner_only(&path, b"A=1").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        write_owner_only(&path, b"B").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "B");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_set_owner_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env.dev");
        fs::write(&path, "A=1").unwrap();
        set_owner_only(&path).unwrap();
        assert!(check_file_permissions(&path).is_empty());
    }
}
