use super::*;
use pretty_assertions::assert_eq;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

#[test]
fn sandbox_none_allows_anything() {
    let policy = ExecutionPolicy::default();
    assert!(policy.check_command(&argv(&["rm", "-rf", "/"])).is_ok());
}

#[test]
fn restricted_denies_blocked_substrings() {
    let policy = ExecutionPolicy {
        sandbox: SandboxMode::Restricted,
        blocked_commands: vec!["rm -rf".to_string()],
        ..Default::default()
    };
    assert!(policy.check_command(&argv(&["echo", "hello"])).is_ok());
    let err = policy.check_command(&argv(&["rm", "-rf", "/tmp"])).unwrap_err();
    assert!(matches!(err, PolicyViolation::BlockedCommand { .. }));
}

#[test]
fn strict_only_allows_safelisted_basenames() {
    let policy = ExecutionPolicy {
        sandbox: SandboxMode::Strict,
        ..Default::default()
    };
    assert!(policy.check_command(&argv(&["/bin/echo", "hi"])).is_ok());
    let err = policy.check_command(&argv(&["curl", "example.com"])).unwrap_err();
    assert!(matches!(err, PolicyViolation::CommandNotSafelisted { .. }));
}

#[test]
fn strict_honors_custom_safelist() {
    let policy = ExecutionPolicy {
        sandbox: SandboxMode::Strict,
        safe_commands: vec!["cargo".to_string()],
        ..Default::default()
    };
    assert!(policy.check_command(&argv(&["cargo", "check"])).is_ok());
    assert!(policy.check_command(&argv(&["ls"])).is_err());
}

#[test]
fn empty_command_is_a_violation() {
    let policy = ExecutionPolicy::default();
    assert!(matches!(
        policy.check_command(&[]).unwrap_err(),
        PolicyViolation::EmptyCommand
    ));
}

#[test]
fn empty_allowed_paths_permits_all_writes() {
    let policy = ExecutionPolicy::default();
    assert!(policy
        .check_write_path(Path::new("/work"), Path::new("/etc/passwd"))
        .is_ok());
}

#[test]
fn writes_must_land_inside_allowed_paths() {
    let policy = ExecutionPolicy {
        allowed_paths: vec![PathBuf::from("/work/project")],
        ..Default::default()
    };
    assert!(policy
        .check_write_path(Path::new("/work/project"), Path::new("src/main.rs"))
        .is_ok());
    let err = policy
        .check_write_path(Path::new("/work/project"), Path::new("/tmp/out"))
        .unwrap_err();
    assert!(matches!(err, PolicyViolation::PathOutsideSandbox { .. }));
}

#[test]
fn parent_traversal_cannot_escape_allowed_paths() {
    let policy = ExecutionPolicy {
        allowed_paths: vec![PathBuf::from("/work/project")],
        ..Default::default()
    };
    let err = policy
        .check_write_path(
            Path::new("/work/project"),
            Path::new("../outside/file.txt"),
        )
        .unwrap_err();
    assert!(matches!(err, PolicyViolation::PathOutsideSandbox { .. }));
}

#[test]
fn approval_policy_matrix() {
    let mut policy = ExecutionPolicy::default();

    policy.approval = ApprovalPolicy::Never;
    assert!(!policy.requires_approval(true, true));

    policy.approval = ApprovalPolicy::OnRequest;
    assert!(policy.requires_approval(false, true));
    assert!(!policy.requires_approval(true, false));

    policy.approval = ApprovalPolicy::OnWrite;
    assert!(policy.requires_approval(true, false));
    assert!(!policy.requires_approval(false, false));

    policy.approval = ApprovalPolicy::Always;
    assert!(policy.requires_approval(false, false));
}

#[test]
fn timeout_cap_takes_the_minimum() {
    let policy = ExecutionPolicy {
        timeout_seconds: Some(10.0),
        ..Default::default()
    };
    assert_eq!(policy.cap_timeout_ms(Some(30_000)), Some(10_000));
    assert_eq!(policy.cap_timeout_ms(Some(5_000)), Some(5_000));
    assert_eq!(policy.cap_timeout_ms(None), Some(10_000));

    let uncapped = ExecutionPolicy::default();
    assert_eq!(uncapped.cap_timeout_ms(Some(5_000)), Some(5_000));
    assert_eq!(uncapped.cap_timeout_ms(None), None);
}
