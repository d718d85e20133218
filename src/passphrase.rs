//! Passphrase resolution.
//!
//! Priority, highest first:
//!
//! 1. an explicit passphrase (`--passphrase` or `ENVCRYPT_PASSPHRASE`)
//! 2. a named secret key (`--secret-key KEY`) present in the secrets store
//! 3. the convention key `<ENV>_SECRET` present in the secrets store
//! 4. an interactive prompt

use crate::error::Result;
use crate::prompt::Prompter;
use crate::secrets::{secret_variable_name, SecretStore};
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

/// Where a passphrase came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassphraseSource {
    Provided,
    Custom,
    Convention,
    Prompt,
}

impl fmt::Display for PassphraseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PassphraseSource::Provided => "provided",
            PassphraseSource::Custom => "custom secret",
            PassphraseSource::Convention => "convention secret",
            PassphraseSource::Prompt => "prompt",
        };
        f.write_str(s)
    }
}

/// A passphrase together with its origin.
pub struct Passphrase {
    value: Zeroizing<String>,
    pub source: PassphraseSource,
}

impl Passphrase {
    pub fn new(value: impl Into<String>, source: PassphraseSource) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
            source,
        }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passphrase")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Outcome of the non-interactive part of resolution.
#[derive(Debug)]
pub enum Resolution {
    Resolved(Passphrase),
    /// No source matched; the caller must ask out-of-band.
    NeedsPrompt,
}

/// Inputs to resolution that come from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassphraseOptions<'a> {
    pub explicit: Option<&'a str>,
    pub secret_key: Option<&'a str>,
}

/// Resolve a passphrase without prompting.
pub fn resolve(
    environment: &str,
    options: PassphraseOptions<'_>,
    secrets: &SecretStore,
) -> Resolution {
    if let Some(explicit) = options.explicit.filter(|p| !p.is_empty()) {
        return Resolution::Resolved(Passphrase::new(explicit, PassphraseSource::Provided));
    }

    if let Some(key) = options.secret_key {
        if let Some(value) = secrets.get(key) {
            debug!(environment, key, "using custom secret");
            return Resolution::Resolved(Passphrase {
                value,
                source: PassphraseSource::Custom,
            });
        }
        debug!(environment, key, "custom secret not set, trying convention");
    }

    let variable = secret_variable_name(environment);
    if let Some(value) = secrets.get(&variable) {
        debug!(environment, key = %variable, "using convention secret");
        return Resolution::Resolved(Passphrase {
            value,
            source: PassphraseSource::Convention,
        });
    }

    Resolution::NeedsPrompt
}

/// Resolve a passphrase, falling back to `prompter` when nothing matched.
///
/// With `confirm` the prompt asks twice.
pub fn obtain(
    environment: &str,
    options: PassphraseOptions<'_>,
    secrets: &SecretStore,
    prompter: &dyn Prompter,
    confirm: bool,
) -> Result<Passphrase> {
    match resolve(environment, options, secrets) {
        Resolution::Resolved(passphrase) => Ok(passphrase),
        Resolution::NeedsPrompt => {
            let prompt = format!("Passphrase for {environment}");
            let value = prompter.passphrase(&prompt, confirm)?;
            Ok(Passphrase {
                value,
                source: PassphraseSource::Prompt,
            })
        }
    }
}
