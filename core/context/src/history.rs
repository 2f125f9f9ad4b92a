//! Wire-ordered message history with exactly-once tool-result matching.

use std::collections::BTreeSet;

use crucible_protocol::ContentBlock;
use crucible_protocol::Message;
use crucible_protocol::Role;
use snafu::Snafu;
use tracing::debug;

use crate::meter::TokenMeter;

/// History bookkeeping violations. These break the wire contract, so the
/// turn cannot continue.
#[derive(Debug, Snafu)]
pub enum HistoryError {
    #[snafu(display("system messages must come first"))]
    SystemNotFirst,

    #[snafu(display("tool_use id is already in flight: {call_id}"))]
    DuplicateToolUse { call_id: String },

    #[snafu(display("tool_result answers no outstanding tool_use: {call_id}"))]
    UnmatchedToolResult { call_id: String },
}

/// The session's messages in wire order, plus the set of tool_use ids
/// still awaiting their results.
///
/// Only the host's message-loop task appends; the scheduler feeds results
/// back through it, which is what keeps ordering deterministic.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    outstanding: BTreeSet<String>,
    total_tokens: i64,
    meter: TokenMeter,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meter(meter: TokenMeter) -> Self {
        Self {
            meter,
            ..Self::default()
        }
    }

    /// Append one message, maintaining tool-use bookkeeping.
    pub fn append(&mut self, message: Message) -> Result<(), HistoryError> {
        match message.role {
            Role::System => {
                if !self.messages.is_empty() {
                    return Err(HistoryError::SystemNotFirst);
                }
            }
            Role::Assistant => {
                for id in message.tool_use_ids() {
                    if !self.outstanding.insert(id.to_string()) {
                        return Err(HistoryError::DuplicateToolUse {
                            call_id: id.to_string(),
                        });
                    }
                }
            }
            Role::User => {
                for id in message.tool_result_ids() {
                    if !self.outstanding.remove(id) {
                        return Err(HistoryError::UnmatchedToolResult {
                            call_id: id.to_string(),
                        });
                    }
                }
            }
        }
        self.total_tokens += self.meter.message_tokens(&message);
        self.messages.push(message);
        Ok(())
    }

    /// Append a batch of tool results as one user message.
    ///
    /// Every outstanding `tool_use` must be answered exactly once before
    /// the next assistant message is requested.
    pub fn append_tool_results(&mut self, blocks: Vec<ContentBlock>) -> Result<(), HistoryError> {
        debug!(count = blocks.len(), "appending tool results");
        self.append(Message::tool_results(blocks))
    }

    /// Tool uses still awaiting results.
    pub fn outstanding_tool_uses(&self) -> Vec<String> {
        self.outstanding.iter().cloned().collect()
    }

    pub fn has_outstanding_tool_uses(&self) -> bool {
        !self.outstanding.is_empty()
    }

    /// The messages to send to the model.
    pub fn snapshot_for_model(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn total_tokens(&self) -> i64 {
        self.total_tokens
    }

    pub fn meter(&self) -> &TokenMeter {
        &self.meter
    }

    /// Replace the whole message list, recomputing token totals. Tool-use
    /// bookkeeping is untouched: compaction never runs with tools in
    /// flight.
    pub(crate) fn replace_messages(&mut self, messages: Vec<Message>) {
        self.total_tokens = messages
            .iter()
            .map(|message| self.meter.message_tokens(message))
            .sum();
        self.messages = messages;
    }
}

#[cfg(test)]
#[path = "history.test.rs"]
mod tests;
