// Shared fixtures for integration tests.
#![allow(dead_code)]

use envcrypt::commands::Context;
use envcrypt::config::Config;
use envcrypt::error::{EnvcryptError, Result};
use envcrypt::gpg::{ciphertext_path, EncryptionTool};
use envcrypt::prompt::Prompter;
use envcrypt::reporter::Reporter;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

const HEADER: &str = "FAKE-GPG:";

/// Stand-in for gpg: "ciphertext" is the plaintext behind a header naming
/// the passphrase.
#[derive(Default)]
pub struct FakeTool {
    pub encrypt_calls: Cell<usize>,
    pub decrypt_calls: Cell<usize>,
    pub unavailable: bool,
    pub fail_encrypt: bool,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn failing_encrypt() -> Self {
        Self {
            fail_encrypt: true,
            ..Self::default()
        }
    }

    /// Write a ciphertext the fake can decrypt with `passphrase`.
    pub fn seal(path: &Path, passphrase: &str, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, format!("{HEADER}{passphrase}\n{content}")).unwrap();
    }
}

impl EncryptionTool for FakeTool {
    fn name(&self) -> &str {
        "fake-gpg"
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(EnvcryptError::ToolUnavailable {
                tool: "fake-gpg".to_string(),
                reason: "not installed".to_string(),
            });
        }
        Ok(())
    }

    fn encrypt(&self, passphrase: &str, source: &Path) -> Result<PathBuf> {
        self.encrypt_calls.set(self.encrypt_calls.get() + 1);
        let output = ciphertext_path(source);
        if self.fail_encrypt {
            fs::write(&output, b"partial")?;
            return Err(EnvcryptError::ToolInvocation {
                tool: "fake-gpg".to_string(),
                operation: "encrypt".to_string(),
                stderr: "gpg: write error".to_string(),
            });
        }
        let content = fs::read_to_string(source)?;
        Self::seal(&output, passphrase, &content);
        Ok(output)
    }

    fn decrypt(&self, passphrase: &str, source: &Path, destination: &Path) -> Result<()> {
        self.decrypt_calls.set(self.decrypt_calls.get() + 1);
        let data = fs::read_to_string(source)?;

        // Like gpg, clobber the output before discovering the key is wrong
        fs::write(destination, b"")?;

        let header = format!("{HEADER}{passphrase}\n");
        match data.strip_prefix(&header) {
            Some(content) => {
                fs::write(destination, content)?;
                Ok(())
            }
            None => Err(EnvcryptError::ToolInvocation {
                tool: "fake-gpg".to_string(),
                operation: "decrypt".to_string(),
                stderr: "gpg: decryption failed: Bad session key".to_string(),
            }),
        }
    }
}

/// Prompter answering from queues; an empty queue behaves like no terminal.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub passphrases: RefCell<VecDeque<String>>,
    pub confirms: RefCell<VecDeque<bool>>,
    pub selection: Vec<usize>,
    pub asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn with_passphrases(values: &[&str]) -> Self {
        Self {
            passphrases: RefCell::new(values.iter().map(|v| v.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_confirms(mut self, values: &[bool]) -> Self {
        self.confirms = RefCell::new(values.iter().copied().collect());
        self
    }

    pub fn with_selection(mut self, indices: &[usize]) -> Self {
        self.selection = indices.to_vec();
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn passphrase(&self, prompt: &str, _confirm: bool) -> Result<Zeroizing<String>> {
        self.asked.borrow_mut().push(prompt.to_string());
        self.passphrases
            .borrow_mut()
            .pop_front()
            .map(Zeroizing::new)
            .ok_or_else(|| EnvcryptError::PromptUnavailable(prompt.to_string()))
    }

    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool> {
        self.asked.borrow_mut().push(prompt.to_string());
        self.confirms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| EnvcryptError::PromptUnavailable(prompt.to_string()))
    }

    fn select(&self, prompt: &str, _items: &[String]) -> Result<Vec<usize>> {
        self.asked.borrow_mut().push(prompt.to_string());
        Ok(self.selection.clone())
    }
}

/// Quiet, non-interactive context rooted at `dir`.
pub fn context<'a>(dir: &Path, tool: &'a FakeTool, prompter: &'a dyn Prompter) -> Context<'a> {
    Context {
        config: Config {
            working_dir: dir.to_path_buf(),
            quiet: true,
            interactive: false,
            ..Config::default()
        },
        reporter: Reporter::quiet(),
        tool,
        prompter,
    }
}

pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

pub fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
