//! Events surfaced to the host while a turn executes.

use serde::Deserialize;
use serde::Serialize;

/// Observable progress of the core, delivered over the session's event
/// channel. Hosts render these; the core never blocks on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A turn began processing.
    TaskStarted { turn_id: String },
    /// A tool call was dispatched.
    ToolCallBegin {
        call_id: String,
        name: String,
        input_preview: String,
    },
    /// A tool call finished.
    ToolCallEnd {
        call_id: String,
        success: bool,
        duration_ms: u64,
        truncated: bool,
    },
    /// The model produced user-visible text.
    AssistantMessage { text: String },
    /// The turn finished normally.
    TaskComplete { summary: String },
    /// The turn aborted on a fatal error.
    TaskFailed { error: String },
    /// History was compacted.
    Compaction { pre_tokens: i64, post_tokens: i64 },
}
