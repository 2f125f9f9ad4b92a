use super::*;
use pretty_assertions::assert_eq;

fn numbered_lines(count: usize) -> String {
    (1..=count).map(|n| format!("line {n}\n")).collect()
}

#[test]
fn short_output_is_unchanged() {
    let content = "hello world\n";
    let result = truncate_output(content);
    assert_eq!(result.text, content);
    assert!(!result.truncated);
}

#[test]
fn output_exactly_at_max_lines_is_unchanged() {
    let content = numbered_lines(MAX_LINES);
    assert!(content.len() <= MAX_BYTES);
    let result = truncate_output(&content);
    assert!(!result.truncated);
    assert_eq!(result.text, content);
}

#[test]
fn output_exactly_at_max_bytes_is_unchanged() {
    let content = "x".repeat(MAX_BYTES);
    let result = truncate_output(&content);
    assert!(!result.truncated);
    assert_eq!(result.text.len(), MAX_BYTES);
}

#[test]
fn one_line_over_truncates_with_marker() {
    let content = numbered_lines(MAX_LINES + 1);
    let result = truncate_output(&content);
    assert!(result.truncated);
    assert_eq!(result.text.matches("[... omitted ").count(), 1);
    assert!(result.text.contains(&format!(
        "[... omitted 1 of {} lines ...]",
        MAX_LINES + 1
    )));
    assert!(result.text.starts_with("line 1\n"));
    assert!(result.text.ends_with(&format!("line {}\n", MAX_LINES + 1)));
}

#[test]
fn head_and_tail_line_counts_are_respected() {
    let content = numbered_lines(1000);
    let result = truncate_output(&content);
    assert!(result.truncated);
    assert!(result.text.contains("line 128\n"));
    assert!(!result.text.contains("line 129\n"));
    assert!(result.text.contains("line 873\n"));
    assert!(!result.text.contains("line 872\n"));
    assert!(result.text.contains("[... omitted 744 of 1000 lines ...]"));
}

#[test]
fn oversized_output_fits_the_byte_budget() {
    let long_line = "a".repeat(200);
    let content: String = (0..1000).map(|_| format!("{long_line}\n")).collect();
    let result = truncate_output(&content);
    assert!(result.truncated);
    assert!(result.text.len() <= MAX_BYTES, "len = {}", result.text.len());
}

#[test]
fn one_byte_over_with_multibyte_char_stays_on_scalar_boundary() {
    // 10 * 1024 - 1 ASCII bytes, then a 4-byte scalar straddling the limit.
    let mut content = "y".repeat(MAX_BYTES - 1);
    content.push('\u{1F980}');
    assert!(content.len() > MAX_BYTES);
    let result = truncate_output(&content);
    assert!(result.truncated);
    assert!(result.text.len() <= MAX_BYTES);
    assert!(!result.text.contains('\u{FFFD}'));
    // Re-slicing at every boundary must not panic.
    for (index, _) in result.text.char_indices() {
        let _ = &result.text[..index];
    }
}

#[test]
fn formatter_is_deterministic() {
    let content = numbered_lines(5000);
    let first = truncate_output(&content);
    let second = truncate_output(&content);
    assert_eq!(first, second);
}

#[test]
fn single_huge_line_is_trimmed_without_newlines() {
    let content = "z".repeat(3 * MAX_BYTES);
    let result = truncate_output(&content);
    assert!(result.truncated);
    assert!(result.text.len() <= MAX_BYTES);
    assert_eq!(result.text.matches("[... omitted ").count(), 1);
}

#[test]
fn exec_envelope_carries_truncation_flag() {
    let envelope = format_exec_output(
        "ok\n",
        0,
        Duration::from_millis(312),
        false,
    );
    assert_eq!(envelope.output, "ok\n");
    assert_eq!(envelope.metadata.exit_code, 0);
    assert_eq!(envelope.metadata.duration_seconds, 0.3);
    assert!(!envelope.metadata.timed_out);
    assert!(!envelope.metadata.truncated);

    let big = numbered_lines(2000);
    let envelope = format_exec_output(&big, 1, Duration::from_secs(2), true);
    assert!(envelope.metadata.truncated);
    assert!(envelope.metadata.timed_out);
    assert_eq!(envelope.metadata.exit_code, 1);
}
