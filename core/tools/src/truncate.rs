//! Deterministic head+tail truncation of tool output.
//!
//! The formatter is pure: identical input produces byte-identical output.
//! Truncation points always land on UTF-8 scalar boundaries, so no
//! replacement characters are ever introduced.

use std::time::Duration;

use crucible_protocol::ExecEnvelope;
use crucible_protocol::ExecMetadata;

/// Byte ceiling for content delivered to the model.
pub const MAX_BYTES: usize = 10 * 1024;
/// Line ceiling for content delivered to the model.
pub const MAX_LINES: usize = 256;
/// Lines kept from the start when truncating.
pub const HEAD_LINES: usize = 128;
/// Lines kept from the end when truncating.
pub const TAIL_LINES: usize = 128;
/// Byte budget for the head portion.
pub const HEAD_BYTES: usize = 5 * 1024;

/// Output of the formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedOutput {
    pub text: String,
    pub truncated: bool,
}

/// Reduce `content` to at most [`MAX_BYTES`] bytes and [`MAX_LINES`] lines,
/// keeping the first [`HEAD_LINES`] and last [`TAIL_LINES`] lines joined by
/// a single elision marker.
pub fn truncate_output(content: &str) -> FormattedOutput {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let total = lines.len();

    if content.len() <= MAX_BYTES && total <= MAX_LINES {
        return FormattedOutput {
            text: content.to_string(),
            truncated: false,
        };
    }

    let head_count = HEAD_LINES.min(total);
    let tail_start = total.saturating_sub(TAIL_LINES).max(head_count);
    let omitted = tail_start - head_count;

    let mut head: String = lines[..head_count].concat();
    let mut tail: String = lines[tail_start..].concat();
    let marker = format!("\n[... omitted {omitted} of {total} lines ...]\n\n");

    if head.len() > HEAD_BYTES {
        head = trim_head(&head, HEAD_BYTES);
    }
    let remaining = MAX_BYTES.saturating_sub(head.len() + marker.len());
    if tail.len() > remaining {
        tail = trim_tail(&tail, remaining);
    }

    FormattedOutput {
        text: format!("{head}{marker}{tail}"),
        truncated: true,
    }
}

/// Wrap shell output in the structured envelope, truncating the body.
pub fn format_exec_output(
    content: &str,
    exit_code: i32,
    duration: Duration,
    timed_out: bool,
) -> ExecEnvelope {
    let formatted = truncate_output(content);
    ExecEnvelope {
        output: formatted.text,
        metadata: ExecMetadata::new(exit_code, duration, timed_out, formatted.truncated),
    }
}

/// Largest prefix of `s` within `budget` bytes, preferring to cut at the
/// last newline inside the budget.
fn trim_head(s: &str, budget: usize) -> String {
    let cut = floor_char_boundary(s, budget);
    let prefix = &s[..cut];
    match prefix.rfind('\n') {
        Some(pos) => s[..=pos].to_string(),
        None => prefix.to_string(),
    }
}

/// Largest suffix of `s` within `budget` bytes, preferring to start just
/// after the first newline inside the budget.
fn trim_tail(s: &str, budget: usize) -> String {
    if budget == 0 {
        return String::new();
    }
    let start = ceil_char_boundary(s, s.len().saturating_sub(budget));
    let suffix = &s[start..];
    match suffix.find('\n') {
        Some(pos) if pos + 1 < suffix.len() => suffix[pos + 1..].to_string(),
        Some(_) => String::new(),
        None => suffix.to_string(),
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut index = index;
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut index = index;
    while !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
#[path = "truncate.test.rs"]
mod tests;
