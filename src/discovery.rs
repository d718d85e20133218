//! Discovery of `.env.<environment>` files.

use crate::error::Result;
use crate::models::RESERVED_ENVIRONMENTS;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

lazy_static! {
    static ref ENV_FILE_PATTERN: Regex =
        Regex::new(r"^\.env\.([A-Za-z0-9_-]+)(\.gpg)?$").expect("env file pattern is valid");
}

/// Directories never descended into during recursive discovery.
const SKIPPED_DIRECTORIES: &[&str] = &["node_modules", "target", "vendor"];

/// Extract the environment token from a file name, if it is an env file.
///
/// Returns `None` for reserved template names and for anything that does not
/// match `.env.<token>` or `.env.<token>.gpg` exactly. Tokens with uppercase
/// letters are skipped with a warning: lookups use the lowercase file name,
/// so such a file could never be processed.
pub fn environment_from_file_name(file_name: &str) -> Option<String> {
    let captures = ENV_FILE_PATTERN.captures(file_name)?;
    let token = captures.get(1)?.as_str();
    if token.chars().any(|c| c.is_ascii_uppercase()) {
        warn!(
            file = file_name,
            "ignoring env file with uppercase letters; rename it to lowercase"
        );
        return None;
    }
    if RESERVED_ENVIRONMENTS.contains(&token) {
        return None;
    }
    Some(token.to_string())
}

/// Environments present in `dir`, sorted and deduplicated.
///
/// Only immediate file entries are considered.
pub fn discover_environments(dir: &Path) -> Result<Vec<String>> {
    let mut found = BTreeSet::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        if let Some(environment) = file_name.to_str().and_then(environment_from_file_name) {
            found.insert(environment);
        }
    }

    debug!(dir = %dir.display(), count = found.len(), "discovered environments");
    Ok(found.into_iter().collect())
}

fn is_skipped_directory(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRECTORIES.contains(&name.as_ref())
}

/// Environments grouped by the directory that contains them.
///
/// Walks `root` recursively, skipping hidden directories and common build or
/// dependency folders. Directories without any environment file are omitted.
pub fn discover_directories(root: &Path) -> Result<BTreeMap<PathBuf, Vec<String>>> {
    let mut groups: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped_directory(e));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(environment) = entry.file_name().to_str().and_then(environment_from_file_name)
        else {
            continue;
        };
        let parent = entry
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        groups.entry(parent).or_default().insert(environment);
    }

    debug!(root = %root.display(), directories = groups.len(), "discovered directories");
    Ok(groups
        .into_iter()
        .map(|(dir, envs)| (dir, envs.into_iter().collect()))
        .collect())
}

/// Label for a discovered directory relative to the walk root.
pub fn directory_label(root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => dir.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_environment_from_file_name() {
        assert_eq!(
            environment_from_file_name(".env.production"),
            Some("production".to_string())
        );
        assert_eq!(
            environment_from_file_name(".env.qa-east.gpg"),
            Some("qa-east".to_string())
        );
        assert_eq!(environment_from_file_name(".env"), None);
        assert_eq!(environment_from_file_name(".env.example"), None);
        assert_eq!(environment_from_file_name(".env.template.gpg"), None);
        assert_eq!(environment_from_file_name(".env.prod.backup.20240101"), None);
        assert_eq!(environment_from_file_name("env.production"), None);
        assert_eq!(environment_from_file_name(".env.Production"), None);
        assert_eq!(environment_from_file_name(".env.QA.gpg"), None);
    }

    #[test]
    fn test_discover_ignores_subdirectories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".env.dev"), "A=1").unwrap();
        fs::create_dir(dir.path().join(".env.staging")).unwrap();

        let envs = discover_environments(dir.path()).unwrap();
        assert_eq!(envs, vec!["dev"]);
    }

    #[test]
    fn test_directory_label() {
        let root = Path::new("/repo");
        assert_eq!(directory_label(root, Path::new("/repo")), ".");
        assert_eq!(
            directory_label(root, Path::new("/repo/services/api")),
            "services/api"
        );
    }
}
