use super::*;
use strum::IntoEnumIterator;

#[test]
fn conversational_kinds_respond_to_model() {
    for kind in [
        ErrorKind::Validation,
        ErrorKind::NotFound,
        ErrorKind::Permission,
        ErrorKind::Conflict,
        ErrorKind::Transient,
        ErrorKind::Timeout,
        ErrorKind::Cancelled,
    ] {
        assert_eq!(kind.severity(), Severity::RespondToModel);
        assert!(!kind.is_fatal());
    }
}

#[test]
fn core_kinds_are_fatal() {
    for kind in [ErrorKind::Sandbox, ErrorKind::System, ErrorKind::Protocol] {
        assert_eq!(kind.severity(), Severity::Fatal);
        assert!(kind.is_fatal());
    }
}

#[test]
fn only_transient_is_retriable() {
    for kind in ErrorKind::iter() {
        assert_eq!(kind.is_retriable(), kind == ErrorKind::Transient);
    }
}

#[test]
fn names_are_stable_snake_case() {
    assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    assert_eq!(ErrorKind::Validation.name(), "validation");
    for kind in ErrorKind::iter() {
        assert!(!kind.name().contains(char::is_uppercase));
    }
}
