// Environment name validation with position-aware error messages.

use envcrypt::error::{EnvcryptError, NameIssue};
use envcrypt::utils::validate_environment_name;

fn issue(name: &str) -> NameIssue {
    match validate_environment_name(name) {
        Err(EnvcryptError::InvalidEnvironment(err)) => err.issue,
        other => panic!("expected InvalidEnvironment for {name:?}, got {other:?}"),
    }
}

#[test]
fn test_valid_names_are_lowercased() {
    assert_eq!(validate_environment_name("production").unwrap(), "production");
    assert_eq!(validate_environment_name("Staging").unwrap(), "staging");
    assert_eq!(validate_environment_name("qa-east_2").unwrap(), "qa-east_2");
    assert_eq!(validate_environment_name("  dev  ").unwrap(), "dev");
}

#[test]
fn test_empty_name() {
    assert_eq!(issue(""), NameIssue::Empty);
    assert_eq!(issue("   "), NameIssue::Empty);
}

#[test]
fn test_must_start_with_letter() {
    assert_eq!(issue("2prod"), NameIssue::MustStartWithLetter { character: '2' });
    assert_eq!(issue("-prod"), NameIssue::MustStartWithLetter { character: '-' });
    assert_eq!(issue(".env"), NameIssue::MustStartWithLetter { character: '.' });
}

#[test]
fn test_invalid_character_position() {
    assert_eq!(
        issue("prod east"),
        NameIssue::InvalidCharacter {
            character: ' ',
            position: 5
        }
    );

    let msg = validate_environment_name("prod/../x").unwrap_err().to_string();
    assert!(msg.contains("Invalid environment name 'prod/../x'"));
    assert!(msg.contains("'/' at position 5"));
}

#[test]
fn test_dots_are_rejected() {
    // a dot would make `.env.<name>.gpg` ambiguous
    assert_eq!(
        issue("prod.gpg"),
        NameIssue::InvalidCharacter {
            character: '.',
            position: 5
        }
    );
}

#[test]
fn test_too_long() {
    let name = "a".repeat(65);
    assert_eq!(
        issue(&name),
        NameIssue::TooLong {
            length: 65,
            maximum: 64
        }
    );
    assert!(validate_environment_name(&"a".repeat(64)).is_ok());
}

#[test]
fn test_reserved_template_names() {
    assert_eq!(issue("example"), NameIssue::Reserved);
    assert_eq!(issue("Template"), NameIssue::Reserved);
}
