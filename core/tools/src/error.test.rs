use super::*;
use crucible_error::ErrorKind;
use crucible_error::Severity;

#[test]
fn kinds_map_to_their_variants() {
    let err = tool_error::ValidationSnafu { message: "bad" }.build();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = tool_error::ConflictSnafu { message: "diverged" }.build();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = tool_error::CancelledSnafu.build();
    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn severity_follows_the_kind() {
    let respond = tool_error::TimeoutSnafu { timeout_ms: 30_000u64 }.build();
    assert_eq!(respond.severity(), Severity::RespondToModel);
    assert!(!respond.is_fatal());

    let fatal = tool_error::SandboxSnafu { message: "blocked" }.build();
    assert_eq!(fatal.severity(), Severity::Fatal);
    assert!(fatal.is_fatal());
}

#[test]
fn io_not_found_becomes_not_found() {
    let err: ToolError =
        std::io::Error::new(std::io::ErrorKind::NotFound, "missing file").into();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err: ToolError =
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "disk").into();
    assert_eq!(err.kind(), ErrorKind::System);
}

#[test]
fn serde_errors_become_validation() {
    let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: ToolError = parse.into();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn model_message_includes_the_detail() {
    let err = tool_error::NotFoundSnafu {
        message: "file not found: /tmp/a",
    }
    .build();
    assert!(err.to_model_message().contains("/tmp/a"));
}
