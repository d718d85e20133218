//! GPG integration for encrypting/decrypting environment files.

use crate::error::{EnvcryptError, Result};
use crate::models::CIPHERTEXT_EXTENSION;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// External encryption engine used by file operations.
pub trait EncryptionTool {
    /// Program name used in messages.
    fn name(&self) -> &str;

    /// Fail with a precondition error when the tool cannot be run.
    fn check_available(&self) -> Result<()>;

    /// Encrypt `source` with `passphrase`, writing `<source>.gpg`.
    fn encrypt(&self, passphrase: &str, source: &Path) -> Result<PathBuf>;

    /// Decrypt `source` with `passphrase` into `destination`.
    fn decrypt(&self, passphrase: &str, source: &Path, destination: &Path) -> Result<()>;
}

/// Path of the ciphertext produced for `plaintext`.
pub fn ciphertext_path(plaintext: &Path) -> PathBuf {
    let mut name: OsString = plaintext
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".");
    name.push(CIPHERTEXT_EXTENSION);
    plaintext.with_file_name(name)
}

/// Symmetric GnuPG driven through its command line.
///
/// The passphrase is written to gpg's stdin (`--passphrase-fd 0`) so it never
/// appears in the process list.
#[derive(Debug, Clone)]
pub struct Gpg {
    program: String,
}

impl Default for Gpg {
    fn default() -> Self {
        Self::new("gpg")
    }
}

impl Gpg {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--batch",
            "--yes",
            "--quiet",
            "--no-symkey-cache",
            "--pinentry-mode",
            "loopback",
            "--passphrase-fd",
            "0",
        ]);
        cmd
    }

    fn run(&self, mut cmd: Command, passphrase: &str, operation: &str) -> Result<()> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| EnvcryptError::ToolUnavailable {
            tool: self.program.clone(),
            reason: e.to_string(),
        })?;

        // gpg may exit before reading stdin; always reap it and prefer its
        // stderr over the broken pipe
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin
                .write_all(passphrase.as_bytes())
                .and_then(|()| stdin.write_all(b"\n")),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(EnvcryptError::ToolInvocation {
                tool: self.program.clone(),
                operation: operation.to_string(),
                stderr,
            });
        }
        written?;
        Ok(())
    }
}

impl EncryptionTool for Gpg {
    fn name(&self) -> &str {
        &self.program
    }

    fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| EnvcryptError::ToolUnavailable {
                tool: self.program.clone(),
                reason: format!("{e}. Install GnuPG from https://gnupg.org/download/"),
            })?;

        if !output.status.success() {
            return Err(EnvcryptError::ToolUnavailable {
                tool: self.program.clone(),
                reason: format!("'--version' exited with {}", output.status),
            });
        }

        if let Some(first) = String::from_utf8_lossy(&output.stdout).lines().next() {
            debug!(version = first, "gpg available");
        }
        Ok(())
    }

    fn encrypt(&self, passphrase: &str, source: &Path) -> Result<PathBuf> {
        let output = ciphertext_path(source);
        trace!(source = %source.display(), output = %output.display(), "gpg encrypt");

        let mut cmd = self.base_command();
        cmd.args(["--symmetric", "--cipher-algo", "AES256", "--output"])
            .arg(&output)
            .arg(source);

        self.run(cmd, passphrase, "encrypt")?;
        Ok(output)
    }

    fn decrypt(&self, passphrase: &str, source: &Path, destination: &Path) -> Result<()> {
        trace!(source = %source.display(), destination = %destination.display(), "gpg decrypt");

        let mut cmd = self.base_command();
        cmd.arg("--output")
            .arg(destination)
            .arg("--decrypt")
            .arg(source);

        self.run(cmd, passphrase, "decrypt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ciphertext_path() {
        assert_eq!(
            ciphertext_path(Path::new("/app/.env.staging")),
            PathBuf::from("/app/.env.staging.gpg")
        );
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let gpg = Gpg::new("envcrypt-no-such-gpg-binary");
        match gpg.check_available() {
            Err(EnvcryptError::ToolUnavailable { tool, .. }) => {
                assert_eq!(tool, "envcrypt-no-such-gpg-binary");
            }
            other => panic!("expected ToolUnavailable, got {other:?}"),
        }
    }
}
