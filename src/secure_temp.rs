//! Secure temporary files for transient plaintext.
//!
//! Used when an existing ciphertext has to be decrypted just to compare it
//! against the current plaintext.

use crate::error::{EnvcryptError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

/// Prefix for envcrypt temporary files
const TEMP_FILE_PREFIX: &str = "envcrypt-compare-";

const STALE_AFTER: Duration = Duration::from_secs(3600);

/// Get the secure temp directory for envcrypt
fn get_secure_temp_dir() -> Result<PathBuf> {
    let temp_dir = std::env::temp_dir().join("envcrypt-secure");

    if !temp_dir.exists() {
        fs::create_dir_all(&temp_dir)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&temp_dir)?.permissions();
        perms.set_mode(0o700);
        fs::set_permissions(&temp_dir, perms)?;
    }

    Ok(temp_dir)
}

fn wipe(path: &Path) -> Result<()> {
    if let Ok(mut content) = fs::read(path) {
        let len = content.len();
        content.zeroize();
        fs::write(path, &content)?;

        let random_data: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();
        fs::write(path, &random_data)?;
    }
    fs::remove_file(path)?;
    Ok(())
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > STALE_AFTER)
        .unwrap_or(false)
}

/// Clean up leftover temporary files from previous runs.
///
/// Only files older than an hour are touched so a concurrent run keeps its own.
pub fn cleanup_old_temp_files() -> Result<()> {
    let temp_dir = get_secure_temp_dir()?;
    let mut removed = 0usize;

    for entry in fs::read_dir(&temp_dir)? {
        let path = entry?.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(TEMP_FILE_PREFIX))
            .unwrap_or(false);
        if is_ours && is_stale(&path) && wipe(&path).is_ok() {
            removed += 1;
        }
    }

    if removed > 0 {
        debug!(removed, "removed stale temp files");
    }
    Ok(())
}

/// Temporary file wiped and removed on cleanup or drop.
pub struct SecureTempFile {
    path: PathBuf,
    cleaned: bool,
}

impl SecureTempFile {
    /// Create a new secure temporary file
    pub fn new() -> Result<Self> {
        let temp_dir = get_secure_temp_dir()?;

        let temp_file = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile_in(&temp_dir)?;

        // Keep the file; lifetime is managed by this struct
        let (_file, path) = temp_file
            .keep()
            .map_err(|e| EnvcryptError::Io(e.error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(Self {
            path,
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file content into a buffer zeroed on drop.
    pub fn read(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(fs::read(&self.path)?))
    }

    /// Securely clean up the temporary file
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.cleaned {
            if self.path.exists() {
                wipe(&self.path)?;
            }
            self.cleaned = true;
        }
        Ok(())
    }
}

impl Drop for SecureTempFile {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
