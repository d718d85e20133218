//! File operations on environment files.
//!
//! Every operation that overwrites an existing file first copies it to a
//! timestamped backup, restores the backup if the operation fails, and
//! removes it on success.

use crate::error::{EnvcryptError, Result};
use crate::gpg::EncryptionTool;
use crate::models::{EnvFilePair, FileOutcome, FileState};
use crate::prompt::Prompter;
use crate::reporter::Reporter;
use crate::secure_temp::SecureTempFile;
use crate::utils;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Template files consulted, in order, when creating a new environment.
pub const TEMPLATE_FILES: &[&str] = &[".env.example", ".env.template"];

/// Name of the active environment file written by `copy`.
pub const ACTIVE_ENV_FILE: &str = ".env";

/// Create a timestamped copy of `path` next to it.
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    let file_name = path
        .file_name()
        .ok_or_else(|| {
            EnvcryptError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a file path: {}", path.display()),
            ))
        })?
        .to_string_lossy();

    let mut backup_path = path.with_file_name(format!("{file_name}.backup.{timestamp}"));
    let mut attempt = 1;
    while backup_path.exists() {
        backup_path = path.with_file_name(format!("{file_name}.backup.{timestamp}.{attempt}"));
        attempt += 1;
    }

    fs::copy(path, &backup_path)?;
    debug!(path = %path.display(), backup = %backup_path.display(), "created backup");
    Ok(backup_path)
}

/// Move a backup back over its original.
pub fn restore_backup(backup: &Path, original: &Path) -> Result<()> {
    fs::rename(backup, original)?;
    info!(path = %original.display(), "restored from backup");
    Ok(())
}

/// Delete a backup that is no longer needed.
pub fn remove_backup(backup: &Path) -> Result<()> {
    fs::remove_file(backup)?;
    debug!(backup = %backup.display(), "removed backup");
    Ok(())
}

/// Run `op`, protecting `target` with a backup if it already exists.
///
/// On failure the backup is restored (or, if there was none, any partial
/// output is removed) and the original error returned.
fn with_backup<T>(
    target: &Path,
    reporter: &Reporter,
    op: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let backup = if target.exists() {
        Some(backup_file(target)?)
    } else {
        None
    };

    match op() {
        Ok(value) => {
            if let Some(backup) = &backup {
                if let Err(e) = remove_backup(backup) {
                    warn!(backup = %backup.display(), error = %e, "could not remove backup");
                }
            }
            Ok(value)
        }
        Err(err) => {
            transition(target, FileState::Failed);
            match &backup {
                Some(backup) => match restore_backup(backup, target) {
                    Ok(()) => {
                        transition(target, FileState::Restored);
                        reporter.warn(&format!(
                            "restored {} from backup",
                            reporter.path(target.display())
                        ));
                    }
                    Err(restore_err) => reporter.error(&format!(
                        "could not restore {} (backup kept at {}): {restore_err}",
                        target.display(),
                        backup.display()
                    )),
                },
                None => {
                    if target.exists() {
                        let _ = fs::remove_file(target);
                    }
                }
            }
            Err(err)
        }
    }
}

/// Path equality, falling back to the canonical form when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn transition(path: &Path, state: FileState) {
    debug!(path = %path.display(), %state, "file state");
}

/// Encrypt/decrypt/copy/create operations bound to a tool and a prompter.
pub struct EnvOperations<'a> {
    tool: &'a dyn EncryptionTool,
    prompter: &'a dyn Prompter,
    reporter: &'a Reporter,
    force: bool,
}

impl<'a> EnvOperations<'a> {
    pub fn new(
        tool: &'a dyn EncryptionTool,
        prompter: &'a dyn Prompter,
        reporter: &'a Reporter,
    ) -> Self {
        Self {
            tool,
            prompter,
            reporter,
            force: false,
        }
    }

    /// Overwrite without asking and re-encrypt over a mismatched ciphertext.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    fn confirm_overwrite(&self, path: &Path) -> Result<()> {
        if self.force || !path.exists() {
            return Ok(());
        }
        let prompt = format!("{} already exists. Overwrite?", path.display());
        if self.prompter.confirm(&prompt, false)? {
            Ok(())
        } else {
            Err(EnvcryptError::Cancelled)
        }
    }

    /// Whether `ciphertext` decrypts with `passphrase` to exactly `plaintext`.
    ///
    /// `Ok(None)` means the passphrase did not open the ciphertext.
    fn ciphertext_matches(
        &self,
        passphrase: &str,
        ciphertext: &Path,
        plaintext: &Path,
    ) -> Result<Option<bool>> {
        let mut temp = SecureTempFile::new()?;
        let matches = match self.tool.decrypt(passphrase, ciphertext, temp.path()) {
            Ok(()) => {
                let current: Zeroizing<Vec<u8>> = Zeroizing::new(fs::read(plaintext)?);
                Some(*temp.read()? == *current)
            }
            Err(EnvcryptError::ToolInvocation { stderr, .. }) => {
                debug!(path = %ciphertext.display(), %stderr, "existing ciphertext did not decrypt");
                None
            }
            Err(other) => return Err(other),
        };
        temp.cleanup()?;
        Ok(matches)
    }

    /// Encrypt `.env.<env>` into `.env.<env>.gpg`.
    ///
    /// When the ciphertext already holds the same content under this
    /// passphrase nothing is written and the outcome is `Skipped`.
    pub fn encrypt_environment(
        &self,
        dir: &Path,
        environment: &str,
        passphrase: &str,
    ) -> Result<FileOutcome> {
        let files = EnvFilePair::locate(dir, environment);
        let plaintext = &files.plaintext;
        let ciphertext = &files.ciphertext;
        transition(&ciphertext.path, FileState::Pending);

        if !plaintext.exists {
            return Err(EnvcryptError::NoPlaintext {
                environment: files.environment().to_string(),
                path: plaintext.path.clone(),
            });
        }

        if ciphertext.exists {
            transition(&ciphertext.path, FileState::TestingPassphrase);
            match self.ciphertext_matches(passphrase, &ciphertext.path, &plaintext.path)? {
                Some(true) => {
                    debug!(file = %ciphertext.display_name(), "ciphertext already up to date");
                    transition(&ciphertext.path, FileState::Skipped);
                    return Ok(FileOutcome {
                        path: ciphertext.path.clone(),
                        state: FileState::Skipped,
                    });
                }
                Some(false) => {}
                None if self.force => {
                    warn!(environment = files.environment(), "re-encrypting with a different passphrase");
                }
                None => {
                    return Err(EnvcryptError::PassphraseMismatch(
                        files.environment().to_string(),
                    ))
                }
            }
        }

        transition(&ciphertext.path, FileState::Ready);
        with_backup(&ciphertext.path, self.reporter, || {
            transition(&ciphertext.path, FileState::Invoking);
            self.tool.encrypt(passphrase, &plaintext.path)
        })?;
        transition(&ciphertext.path, FileState::Succeeded);

        Ok(FileOutcome {
            path: ciphertext.path.clone(),
            state: FileState::Succeeded,
        })
    }

    /// Decrypt `.env.<env>.gpg` into `.env.<env>`.
    pub fn decrypt_environment(
        &self,
        dir: &Path,
        environment: &str,
        passphrase: &str,
    ) -> Result<FileOutcome> {
        let files = EnvFilePair::locate(dir, environment);
        self.decrypt_to(&files, passphrase, &files.plaintext.path)
    }

    fn decrypt_to(
        &self,
        files: &EnvFilePair,
        passphrase: &str,
        destination: &Path,
    ) -> Result<FileOutcome> {
        transition(destination, FileState::Pending);

        if !files.ciphertext.exists {
            return Err(EnvcryptError::NoCiphertext {
                environment: files.environment().to_string(),
                path: files.ciphertext.path.clone(),
            });
        }

        self.confirm_overwrite(destination)?;
        transition(destination, FileState::Ready);

        with_backup(destination, self.reporter, || {
            transition(destination, FileState::Invoking);
            // gpg creates its output with the umask mode; stage it in the
            // private temp dir and write the destination as 0600 ourselves
            let mut temp = SecureTempFile::new()?;
            self.tool
                .decrypt(passphrase, &files.ciphertext.path, temp.path())?;
            let plaintext = temp.read()?;
            temp.cleanup()?;
            utils::write_owner_only(destination, &plaintext)
        })?;
        transition(destination, FileState::Succeeded);

        Ok(FileOutcome {
            path: destination.to_path_buf(),
            state: FileState::Succeeded,
        })
    }

    /// Materialize an environment as the active env file in `dir`.
    ///
    /// Decrypts the ciphertext when there is one and `passphrase` is given;
    /// otherwise copies the plaintext.
    pub fn copy_environment(
        &self,
        dir: &Path,
        environment: &str,
        destination: &str,
        passphrase: Option<&str>,
    ) -> Result<FileOutcome> {
        let files = EnvFilePair::locate(dir, environment);
        let target = Self::copy_destination(dir, environment, destination)?;

        match passphrase {
            Some(passphrase) if files.ciphertext.exists => {
                self.decrypt_to(&files, passphrase, &target)
            }
            _ if files.plaintext.exists => {
                transition(&target, FileState::Pending);
                self.confirm_overwrite(&target)?;
                with_backup(&target, self.reporter, || {
                    transition(&target, FileState::Invoking);
                    let content = Zeroizing::new(fs::read(&files.plaintext.path)?);
                    utils::write_owner_only(&target, &content)
                })?;
                transition(&target, FileState::Succeeded);
                Ok(FileOutcome {
                    path: target,
                    state: FileState::Succeeded,
                })
            }
            _ => Err(EnvcryptError::NoCiphertext {
                environment: files.environment().to_string(),
                path: files.ciphertext.path.clone(),
            }),
        }
    }

    /// Resolve the `copy` destination in `dir`, refusing the environment's
    /// own plaintext or ciphertext.
    pub fn copy_destination(dir: &Path, environment: &str, destination: &str) -> Result<PathBuf> {
        let files = EnvFilePair::locate(dir, environment);
        let target = dir.join(destination);
        if same_file(&target, &files.plaintext.path) || same_file(&target, &files.ciphertext.path) {
            return Err(EnvcryptError::InvalidDestination {
                destination: destination.to_string(),
                environment: files.environment().to_string(),
            });
        }
        Ok(target)
    }

    /// Whether copying this environment needs a passphrase.
    pub fn copy_needs_passphrase(dir: &Path, environment: &str) -> bool {
        EnvFilePair::locate(dir, environment).ciphertext.exists
    }

    /// Create `.env.<env>` from a template, or empty when there is none.
    pub fn create_environment(
        &self,
        dir: &Path,
        environment: &str,
        template: Option<&Path>,
    ) -> Result<PathBuf> {
        let files = EnvFilePair::locate(dir, environment);
        let path = files.plaintext.path.clone();

        if path.exists() && !self.force {
            let prompt = format!("{} already exists. Replace it?", path.display());
            if !self.prompter.confirm(&prompt, false)? {
                return Err(EnvcryptError::FileExists(path));
            }
        }

        let template = match template {
            Some(t) => Some(t.to_path_buf()),
            None => TEMPLATE_FILES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.is_file()),
        };

        let content = match &template {
            Some(t) => {
                debug!(template = %t.display(), "creating from template");
                fs::read_to_string(t)?
            }
            None => format!("# {} environment\n", files.environment()),
        };

        with_backup(&path, self.reporter, || {
            utils::write_owner_only(&path, content.as_bytes())
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_backup_and_restore() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env.dev");
        fs::write(&path, "A=1").unwrap();

        let backup = backup_file(&path).unwrap();
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(".env.dev.backup."));

        fs::write(&path, "garbage").unwrap();
        restore_backup(&backup, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1");
        assert!(!backup.exists());
    }

    #[test]
    fn test_backups_do_not_collide() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env.dev");
        fs::write(&path, "A=1").unwrap();

        let first = backup_file(&path).unwrap();
        let second = backup_file(&path).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_with_backup_restores_on_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "ORIGINAL=1").unwrap();

        let result: Result<()> = with_backup(&path, &Reporter::quiet(), || {
            fs::write(&path, "PARTIAL")?;
            Err(EnvcryptError::Cancelled)
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "ORIGINAL=1");

        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_with_backup_removes_partial_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env.new");

        let result: Result<()> = with_backup(&path, &Reporter::quiet(), || {
            fs::write(&path, "PARTIAL")?;
            Err(EnvcryptError::Cancelled)
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
