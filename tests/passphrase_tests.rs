// Passphrase resolution priority and secrets file lookups.

mod common;

use common::{write, ScriptedPrompter};
use envcrypt::passphrase::{obtain, resolve, PassphraseOptions, PassphraseSource, Resolution};
use envcrypt::secrets::SecretStore;
use serial_test::serial;
use tempfile::tempdir;

fn resolved(resolution: Resolution) -> (String, PassphraseSource) {
    match resolution {
        Resolution::Resolved(p) => (p.expose().to_string(), p.source),
        Resolution::NeedsPrompt => panic!("expected a resolved passphrase"),
    }
}

fn all_tiers() -> SecretStore {
    SecretStore::from_pairs([
        ("DEPLOY_KEY", "custom-value"),
        ("PRODUCTION_SECRET", "convention-value"),
    ])
}

#[test]
fn test_explicit_beats_everything() {
    let options = PassphraseOptions {
        explicit: Some("explicit-value"),
        secret_key: Some("DEPLOY_KEY"),
    };
    assert_eq!(
        resolved(resolve("production", options, &all_tiers())),
        ("explicit-value".to_string(), PassphraseSource::Provided)
    );
}

#[test]
fn test_custom_key_beats_convention() {
    let options = PassphraseOptions {
        explicit: None,
        secret_key: Some("DEPLOY_KEY"),
    };
    assert_eq!(
        resolved(resolve("production", options, &all_tiers())),
        ("custom-value".to_string(), PassphraseSource::Custom)
    );
}

#[test]
fn test_convention_uses_uppercased_name() {
    assert_eq!(
        resolved(resolve("Production", PassphraseOptions::default(), &all_tiers())),
        ("convention-value".to_string(), PassphraseSource::Convention)
    );
}

#[test]
fn test_nothing_matches_needs_prompt() {
    let resolution = resolve("staging", PassphraseOptions::default(), &all_tiers());
    assert!(matches!(resolution, Resolution::NeedsPrompt));
}

#[test]
fn test_obtain_prompts_only_when_needed() {
    let prompter = ScriptedPrompter::with_passphrases(&["typed"]);

    let p = obtain(
        "production",
        PassphraseOptions::default(),
        &all_tiers(),
        &prompter,
        false,
    )
    .unwrap();
    assert_eq!(p.source, PassphraseSource::Convention);
    assert!(prompter.asked.borrow().is_empty());

    let p = obtain(
        "staging",
        PassphraseOptions::default(),
        &all_tiers(),
        &prompter,
        true,
    )
    .unwrap();
    assert_eq!(p.source, PassphraseSource::Prompt);
    assert_eq!(p.expose(), "typed");
    assert_eq!(*prompter.asked.borrow(), vec!["Passphrase for staging".to_string()]);
}

#[test]
#[serial]
fn test_secrets_file_lookup() {
    let dir = tempdir().unwrap();
    let path = write(
        dir.path(),
        ".envcrypt.secrets",
        "# passphrases\nSTAGING_SECRET=\"from file\"\n",
    );
    let store = SecretStore::load(&path).unwrap();

    assert_eq!(
        resolved(resolve("staging", PassphraseOptions::default(), &store)),
        ("from file".to_string(), PassphraseSource::Convention)
    );
}

#[test]
#[serial]
fn test_process_environment_overrides_file() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), ".envcrypt.secrets", "QA_EAST_SECRET=file\n");
    let store = SecretStore::load(&path).unwrap();

    std::env::set_var("QA_EAST_SECRET", "from-env");
    let result = resolved(resolve("qa-east", PassphraseOptions::default(), &store));
    std::env::remove_var("QA_EAST_SECRET");

    assert_eq!(result, ("from-env".to_string(), PassphraseSource::Convention));
}
