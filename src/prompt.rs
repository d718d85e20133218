//! Interactive prompting behind an injectable interface.

use crate::error::{EnvcryptError, Result};
use dialoguer::{Confirm, MultiSelect, Password};
use zeroize::Zeroizing;

/// Source of interactive answers.
///
/// Commands never read stdin directly; they go through a `Prompter` so that
/// batch and non-interactive runs can substitute a deterministic one.
pub trait Prompter {
    /// Ask for a secret. With `confirm`, ask twice and require a match.
    fn passphrase(&self, prompt: &str, confirm: bool) -> Result<Zeroizing<String>>;

    /// Yes/no question.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Pick any number of items. Returns the selected indices.
    fn select(&self, prompt: &str, items: &[String]) -> Result<Vec<usize>>;
}

/// Prompts on the controlling terminal with dialoguer.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn passphrase(&self, prompt: &str, confirm: bool) -> Result<Zeroizing<String>> {
        let mut input = Password::new().with_prompt(prompt);
        if confirm {
            input = input.with_confirmation("Confirm passphrase", "Passphrases do not match");
        }
        let value = Zeroizing::new(input.interact()?);
        if value.is_empty() {
            return Err(EnvcryptError::Cancelled);
        }
        Ok(value)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn select(&self, prompt: &str, items: &[String]) -> Result<Vec<usize>> {
        Ok(MultiSelect::new()
            .with_prompt(prompt)
            .items(items)
            .interact()?)
    }
}

/// Prompter for runs without a terminal. Every question is an error.
#[derive(Debug, Default)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn passphrase(&self, prompt: &str, _confirm: bool) -> Result<Zeroizing<String>> {
        Err(EnvcryptError::PromptUnavailable(prompt.to_string()))
    }

    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool> {
        Err(EnvcryptError::PromptUnavailable(format!(
            "{prompt} (pass --yes to skip confirmation)"
        )))
    }

    fn select(&self, prompt: &str, _items: &[String]) -> Result<Vec<usize>> {
        Err(EnvcryptError::PromptUnavailable(prompt.to_string()))
    }
}

/// Pick the prompter for the current process.
pub fn for_terminal(interactive: bool) -> Box<dyn Prompter> {
    if interactive {
        Box::new(TerminalPrompter)
    } else {
        Box::new(NonInteractive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_non_interactive_fails_deterministically() {
        let prompter = NonInteractive;
        let err = prompter.passphrase("production", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(prompter.confirm("Overwrite?", true).is_err());
        assert!(prompter.select("Pick", &["a".to_string()]).is_err());
    }
}
