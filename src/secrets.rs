//! Local secrets file holding per-environment passphrases.
//!
//! The file uses dotenv syntax: `KEY=value` lines, `#` comments, an optional
//! `export ` prefix and optional matching quotes around the value. Lookups
//! consult the process environment first, so CI can inject `<ENV>_SECRET`
//! without a file on disk.

use crate::error::Result;
use crate::utils;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

/// Default secrets file name, relative to the working directory.
pub const DEFAULT_SECRETS_FILE: &str = ".envcrypt.secrets";

/// Suffix of the convention-based secret variable.
pub const SECRET_SUFFIX: &str = "_SECRET";

/// Derive the convention variable name for an environment.
///
/// `production` becomes `PRODUCTION_SECRET`, `qa-east` becomes
/// `QA_EAST_SECRET`.
pub fn secret_variable_name(environment: &str) -> String {
    let mut name: String = environment
        .chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect();
    name.push_str(SECRET_SUFFIX);
    name
}

/// Key/value secrets loaded from the secrets file.
pub struct SecretStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, Zeroizing<String>>,
    use_process_env: bool,
}

impl SecretStore {
    /// Store with no file and no process environment fallback.
    pub fn empty() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
            use_process_env: false,
        }
    }

    /// Store built from literal pairs. Does not consult the process environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Zeroizing::new(v.into())))
            .collect();
        Self {
            path: None,
            entries,
            use_process_env: false,
        }
    }

    /// Load the secrets file at `path`. A missing file yields an empty store.
    ///
    /// The returned store also consults the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = BTreeMap::new();
        if path.exists() {
            let mut content = fs::read_to_string(path)?;
            for (key, value) in parse_lines(&content) {
                entries.insert(key, Zeroizing::new(value));
            }
            content.zeroize();
            debug!(path = %path.display(), keys = entries.len(), "loaded secrets file");
        } else {
            debug!(path = %path.display(), "no secrets file");
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
            use_process_env: true,
        })
    }

    /// Look up a secret. The process environment wins over the file.
    pub fn get(&self, key: &str) -> Option<Zeroizing<String>> {
        if self.use_process_env {
            if let Ok(value) = std::env::var(key) {
                if !value.is_empty() {
                    return Some(Zeroizing::new(value));
                }
            }
        }
        self.entries
            .get(key)
            .filter(|v| !v.is_empty())
            .map(|v| Zeroizing::new(v.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys stored in the file (process environment excluded).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Set a value in memory. Call [`SecretStore::save`] to persist.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .insert(key.into(), Zeroizing::new(value.into()));
    }

    /// Persist the store, rewriting known keys in place and keeping every
    /// other line (comments, unrelated variables) untouched.
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.path.clone().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "secrets store has no file path")
        })?;

        let existing = if path.exists() {
            Zeroizing::new(fs::read_to_string(&path)?)
        } else {
            Zeroizing::new(String::from("# envcrypt passphrases. Do not commit this file.\n"))
        };

        let mut written = Vec::new();
        let mut out = Zeroizing::new(String::new());
        for line in existing.lines() {
            match parse_line(line) {
                Some((key, _)) if self.entries.contains_key(&key) => {
                    out.push_str(&format_entry(&key, &self.entries[&key]));
                    written.push(key);
                }
                _ => out.push_str(line),
            }
            out.push('\n');
        }
        for (key, value) in &self.entries {
            if !written.contains(key) {
                out.push_str(&format_entry(key, value));
                out.push('\n');
            }
        }

        utils::write_owner_only(&path, out.as_bytes())?;
        debug!(path = %path.display(), keys = self.entries.len(), "saved secrets file");
        Ok(path)
    }
}

/// Single-quote values that `parse_line` would otherwise trim, cut or unquote.
fn format_entry(key: &str, value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\''));
    if needs_quotes {
        format!("{key}='{value}'")
    } else {
        format!("{key}={value}")
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse dotenv-style content into key/value pairs, in file order.
pub fn parse_lines(content: &str) -> Vec<(String, String)> {
    content.lines().filter_map(parse_line).collect()
}
