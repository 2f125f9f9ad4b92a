//! Bounded conversation context.
//!
//! Message history under a token budget, approximate token accounting,
//! pinned snippets that survive compaction, and the compaction pass
//! itself.

mod compaction;
mod history;
mod meter;
mod pins;

pub use compaction::CompactionError;
pub use compaction::CompactionOutcome;
pub use compaction::CompactionSettings;
pub use compaction::Compactor;
pub use compaction::InFlightGuard;
pub use compaction::SUMMARY_PREFIX;
pub use compaction::Summarizer;
pub use compaction::ToolExecutionGuard;
pub use history::ConversationHistory;
pub use history::HistoryError;
pub use meter::TokenMeter;
pub use pins::Pin;
pub use pins::PinStore;
