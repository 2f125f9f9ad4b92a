//! Summarization fallback used when the host supplies no model-backed
//! summarizer.

use async_trait::async_trait;
use crucible_context::CompactionError;
use crucible_context::Summarizer;
use crucible_protocol::ContentBlock;
use crucible_protocol::Message;
use crucible_protocol::Role;

/// Maximum characters kept per summarized message.
const HEADLINE_CHARS: usize = 120;

/// Extractive summarizer: one headline per message, no model call.
///
/// Loses detail a model-backed summarizer would keep, but always succeeds
/// and never blocks compaction on network availability.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlineSummarizer;

#[async_trait]
impl Summarizer for HeadlineSummarizer {
    async fn summarize(
        &self,
        older: &[Message],
        focus: Option<&str>,
    ) -> Result<String, CompactionError> {
        let mut lines = Vec::with_capacity(older.len() + 1);
        if let Some(focus) = focus {
            lines.push(format!("(focus: {focus})"));
        }
        for message in older {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let headline = headline(message);
            if !headline.is_empty() {
                lines.push(format!("{role}: {headline}"));
            }
        }
        Ok(lines.join("\n"))
    }
}

fn headline(message: &Message) -> String {
    let text = message.text();
    let line = text.lines().next().unwrap_or_default();
    if !line.is_empty() {
        return shorten(line);
    }
    // No text: describe the tool traffic instead.
    let tools: Vec<String> = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { name, .. } => Some(format!("ran {name}")),
            ContentBlock::ToolResult { tool_use_id, .. } => {
                Some(format!("result for {tool_use_id}"))
            }
            _ => None,
        })
        .collect();
    shorten(&tools.join(", "))
}

fn shorten(text: &str) -> String {
    if text.len() <= HEADLINE_CHARS {
        return text.to_string();
    }
    let mut cut = HEADLINE_CHARS;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &text[..cut])
}
