use super::*;
use pretty_assertions::assert_eq;

#[test]
fn hashes_are_derived_from_contents() {
    let edit = FileEdit::new(
        "/tmp/a.txt",
        "write_file",
        FileAction::Update,
        Some("before".to_string()),
        Some("after".to_string()),
    );
    assert_eq!(edit.old_hash.as_deref(), Some(sha256_hex("before").as_str()));
    assert_eq!(edit.new_hash.as_deref(), Some(sha256_hex("after").as_str()));
}

#[test]
fn sha256_hex_is_stable() {
    // Well-known digest of the empty string.
    assert_eq!(
        sha256_hex(""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(sha256_hex("abc").len(), 64);
}

#[test]
fn read_actions_are_not_mutations() {
    assert!(!FileAction::Read.is_mutation());
    for action in [
        FileAction::Create,
        FileAction::Update,
        FileAction::Delete,
        FileAction::Rename,
    ] {
        assert!(action.is_mutation());
    }
}

#[test]
fn action_names_are_snake_case() {
    assert_eq!(FileAction::Create.to_string(), "create");
    assert_eq!(FileAction::Rename.as_str(), "rename");
}
