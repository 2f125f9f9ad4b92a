//! Replacing older history with a generated summary.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Instant;

use async_trait::async_trait;
use crucible_config::CompactionConfig;
use crucible_protocol::ContentBlock;
use crucible_protocol::Message;
use crucible_protocol::Role;
use snafu::Snafu;
use tracing::debug;
use tracing::info;

use crate::history::ConversationHistory;
use crate::pins::PinStore;

/// Prefix of the synthetic summary message, also used to recognize prior
/// summaries so they are kept verbatim.
pub const SUMMARY_PREFIX: &str = "Previous conversation summary:";

/// Prefix of the synthetic pin re-attachment message.
const PINS_PREFIX: &str = "Pinned context:";

/// Compaction failures.
#[derive(Debug, Snafu)]
pub enum CompactionError {
    #[snafu(display("summarizer failed: {message}"))]
    SummarizerFailed { message: String },
}

/// External summarization of older history.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        older: &[Message],
        focus: Option<&str>,
    ) -> Result<String, CompactionError>;
}

/// What a compaction pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Below the threshold, or nothing left to fold.
    Skipped,
    /// Tools are in flight; try again after the batch drains.
    Deferred,
    Compacted {
        pre_tokens: i64,
        post_tokens: i64,
        removed_messages: usize,
    },
}

/// Counter of in-flight tool batches; compaction refuses while positive.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionGuard {
    active: Arc<AtomicUsize>,
}

impl ToolExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a batch as running until the returned guard drops.
    pub fn begin(&self) -> InFlightGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Compaction policy knobs.
#[derive(Debug, Clone)]
pub struct CompactionSettings {
    pub auto: bool,
    pub keep_last_turns: i32,
    pub target_tokens: i64,
}

impl From<CompactionConfig> for CompactionSettings {
    fn from(config: CompactionConfig) -> Self {
        Self {
            auto: config.auto,
            keep_last_turns: config.keep_last_turns,
            target_tokens: config.target_tokens,
        }
    }
}

/// Folds older history into a summary while preserving the system prompt,
/// recent turns, prior summaries, and pinned content.
pub struct Compactor {
    settings: CompactionSettings,
    summarizer: Arc<dyn Summarizer>,
}

impl Compactor {
    pub fn new(settings: CompactionSettings, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            settings,
            summarizer,
        }
    }

    pub fn settings(&self) -> &CompactionSettings {
        &self.settings
    }

    /// Run one compaction pass when needed.
    ///
    /// Fires when `force` is set or the history exceeds `target_tokens`
    /// with `auto` enabled. Never runs while tools are in flight. Calling
    /// twice without an intervening append is a no-op on the second call.
    pub async fn compact_if_needed(
        &self,
        history: &mut ConversationHistory,
        pins: &mut PinStore,
        in_flight: &ToolExecutionGuard,
        force: bool,
        focus: Option<&str>,
    ) -> Result<CompactionOutcome, CompactionError> {
        let pre_tokens = history.total_tokens();
        let over_budget = pre_tokens > self.settings.target_tokens;
        if !force && !(self.settings.auto && over_budget) {
            return Ok(CompactionOutcome::Skipped);
        }
        if in_flight.active() > 0 {
            debug!("compaction deferred: tools in flight");
            return Ok(CompactionOutcome::Deferred);
        }

        let now = Instant::now();
        pins.expire(now);

        let messages = history.messages();
        let head_len = messages
            .iter()
            .take_while(|message| message.role == Role::System)
            .count();
        let tail_start = tail_start_index(messages, head_len, self.settings.keep_last_turns);

        // Partition the middle into prior summaries (kept verbatim) and
        // the older slice that gets folded. Stale pin attachments are
        // dropped; they are re-rendered below.
        let mut kept_summaries = Vec::new();
        let mut older = Vec::new();
        for message in &messages[head_len..tail_start] {
            if is_summary_message(message) {
                kept_summaries.push(message.clone());
            } else if !is_pins_message(message) {
                older.push(message.clone());
            }
        }

        if older.is_empty() {
            return Ok(CompactionOutcome::Skipped);
        }

        let summary = self.summarizer.summarize(&older, focus).await?;

        let mut compacted: Vec<Message> = Vec::with_capacity(messages.len());
        compacted.extend_from_slice(&messages[..head_len]);
        compacted.extend(kept_summaries);
        compacted.push(Message::user_text(format!("{SUMMARY_PREFIX}\n{summary}")));
        if let Some(pin_block) = pins.render(now) {
            compacted.push(Message::user_text(format!("{PINS_PREFIX}\n{pin_block}")));
        }
        let tail: Vec<Message> = messages[tail_start..]
            .iter()
            .filter(|message| !is_pins_message(message))
            .cloned()
            .collect();
        compacted.extend(tail);

        let removed_messages = history.len().saturating_sub(compacted.len());
        history.replace_messages(compacted);
        let post_tokens = history.total_tokens();

        info!(
            pre_tokens,
            post_tokens, removed_messages, "history compacted"
        );
        Ok(CompactionOutcome::Compacted {
            pre_tokens,
            post_tokens,
            removed_messages,
        })
    }
}

/// Index where the kept tail begins: the start of the `keep_last_turns`-th
/// genuine user turn from the end.
fn tail_start_index(messages: &[Message], head_len: usize, keep_last_turns: i32) -> usize {
    if keep_last_turns <= 0 {
        return messages.len();
    }
    let mut turns = 0;
    for index in (head_len..messages.len()).rev() {
        if is_user_turn_start(&messages[index]) {
            turns += 1;
            if turns >= keep_last_turns {
                return index;
            }
        }
    }
    head_len
}

/// A genuine user input: user role, carries text, no tool results.
fn is_user_turn_start(message: &Message) -> bool {
    message.role == Role::User
        && message.tool_result_ids().is_empty()
        && message
            .content
            .iter()
            .any(|block| matches!(block, ContentBlock::Text { .. }))
        && !is_summary_message(message)
        && !is_pins_message(message)
}

fn is_summary_message(message: &Message) -> bool {
    message.role == Role::User && message.text().starts_with(SUMMARY_PREFIX)
}

fn is_pins_message(message: &Message) -> bool {
    message.role == Role::User && message.text().starts_with(PINS_PREFIX)
}

#[cfg(test)]
#[path = "compaction.test.rs"]
mod tests;
