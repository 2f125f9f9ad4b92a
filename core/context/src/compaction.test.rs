use super::*;
use crate::history::ConversationHistory;
use crate::pins::Pin;
use crate::pins::PinStore;
use pretty_assertions::assert_eq;
use std::time::Duration;

struct CannedSummarizer;

#[async_trait]
impl Summarizer for CannedSummarizer {
    async fn summarize(
        &self,
        older: &[Message],
        focus: Option<&str>,
    ) -> Result<String, CompactionError> {
        let mut summary = format!("{} earlier messages folded", older.len());
        if let Some(focus) = focus {
            summary.push_str(&format!(" (focus: {focus})"));
        }
        Ok(summary)
    }
}

fn compactor(auto: bool, keep_last_turns: i32, target_tokens: i64) -> Compactor {
    Compactor::new(
        CompactionSettings {
            auto,
            keep_last_turns,
            target_tokens,
        },
        Arc::new(CannedSummarizer),
    )
}

/// A history with `turns` user/assistant exchanges of chunky messages.
fn filled_history(turns: usize) -> ConversationHistory {
    let mut history = ConversationHistory::new();
    history
        .append(Message::system_text("you are a helpful assistant"))
        .unwrap();
    for index in 0..turns {
        history
            .append(Message::user_text(format!(
                "question {index}: {}",
                "context ".repeat(100)
            )))
            .unwrap();
        history
            .append(Message::assistant_text(format!(
                "answer {index}: {}",
                "detail ".repeat(100)
            )))
            .unwrap();
    }
    history
}

fn summary_count(history: &ConversationHistory) -> usize {
    history
        .messages()
        .iter()
        .filter(|message| message.text().starts_with(SUMMARY_PREFIX))
        .count()
}

#[tokio::test]
async fn below_threshold_is_skipped() {
    let compactor = compactor(true, 2, 1_000_000);
    let mut history = filled_history(4);
    let mut pins = PinStore::default();
    let outcome = compactor
        .compact_if_needed(&mut history, &mut pins, &ToolExecutionGuard::new(), false, None)
        .await
        .unwrap();
    assert_eq!(outcome, CompactionOutcome::Skipped);
}

#[tokio::test]
async fn over_budget_history_compacts_under_target() {
    let compactor = compactor(true, 2, 500);
    let mut history = filled_history(10);
    let mut pins = PinStore::default();
    let pre_messages = history.len();

    let outcome = compactor
        .compact_if_needed(&mut history, &mut pins, &ToolExecutionGuard::new(), false, None)
        .await
        .unwrap();

    match outcome {
        CompactionOutcome::Compacted {
            pre_tokens,
            post_tokens,
            removed_messages,
        } => {
            assert!(post_tokens < pre_tokens);
            assert!(removed_messages > 0);
        }
        other => panic!("expected compaction, got {other:?}"),
    }
    assert!(history.len() < pre_messages);
    // System prompt survives in first position.
    assert_eq!(history.messages()[0].role, Role::System);
    // One synthetic summary message exists.
    assert_eq!(summary_count(&history), 1);
    // The last two genuine user turns survive verbatim.
    let text = history
        .messages()
        .iter()
        .map(Message::text)
        .collect::<Vec<_>>()
        .join("\n");
    assert!(text.contains("question 8"));
    assert!(text.contains("question 9"));
    assert!(!text.contains("question 0"));
}

#[tokio::test]
async fn pins_survive_compaction_until_ttl() {
    let compactor = compactor(true, 1, 100);
    let mut history = filled_history(6);
    let mut pins = PinStore::default();
    pins.insert(Pin::new("standards", "always use spaces"));
    pins.insert(Pin::new("volatile", "stale soon").with_ttl(Duration::from_millis(0)));

    compactor
        .compact_if_needed(&mut history, &mut pins, &ToolExecutionGuard::new(), false, None)
        .await
        .unwrap();

    let text = history
        .messages()
        .iter()
        .map(Message::text)
        .collect::<Vec<_>>()
        .join("\n");
    assert!(text.contains("[standards] always use spaces"));
    assert!(!text.contains("stale soon"));
}

#[tokio::test]
async fn second_compaction_without_appends_is_a_no_op() {
    let compactor = compactor(true, 2, 500);
    let mut history = filled_history(10);
    let mut pins = PinStore::default();
    let guard = ToolExecutionGuard::new();

    let first = compactor
        .compact_if_needed(&mut history, &mut pins, &guard, false, None)
        .await
        .unwrap();
    assert!(matches!(first, CompactionOutcome::Compacted { .. }));

    let snapshot = history.snapshot_for_model();
    let second = compactor
        .compact_if_needed(&mut history, &mut pins, &guard, false, None)
        .await
        .unwrap();
    // Either under target now, or nothing older left to fold.
    assert_eq!(second, CompactionOutcome::Skipped);
    assert_eq!(history.snapshot_for_model(), snapshot);
}

#[tokio::test]
async fn compaction_defers_while_tools_run()  {
    let compactor = compactor(true, 2, 100);
    let mut history = filled_history(6);
    let mut pins = PinStore::default();
    let guard = ToolExecutionGuard::new();

    let in_flight = guard.begin();
    let outcome = compactor
        .compact_if_needed(&mut history, &mut pins, &guard, false, None)
        .await
        .unwrap();
    assert_eq!(outcome, CompactionOutcome::Deferred);

    drop(in_flight);
    let outcome = compactor
        .compact_if_needed(&mut history, &mut pins, &guard, false, None)
        .await
        .unwrap();
    assert!(matches!(outcome, CompactionOutcome::Compacted { .. }));
}

#[tokio::test]
async fn force_compacts_below_threshold() {
    let compactor = compactor(true, 1, 1_000_000);
    let mut history = filled_history(5);
    let mut pins = PinStore::default();
    let outcome = compactor
        .compact_if_needed(
            &mut history,
            &mut pins,
            &ToolExecutionGuard::new(),
            true,
            Some("the refactor"),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, CompactionOutcome::Compacted { .. }));
    let text = history
        .messages()
        .iter()
        .map(Message::text)
        .collect::<Vec<_>>()
        .join("\n");
    assert!(text.contains("focus: the refactor"));
}

#[tokio::test]
async fn auto_disabled_never_fires_on_threshold() {
    let compactor = compactor(false, 2, 100);
    let mut history = filled_history(10);
    let mut pins = PinStore::default();
    let outcome = compactor
        .compact_if_needed(&mut history, &mut pins, &ToolExecutionGuard::new(), false, None)
        .await
        .unwrap();
    assert_eq!(outcome, CompactionOutcome::Skipped);
}

#[tokio::test]
async fn prior_summaries_are_kept_verbatim() {
    let compactor = compactor(true, 1, 200);
    let mut history = filled_history(6);
    let mut pins = PinStore::default();
    let guard = ToolExecutionGuard::new();

    compactor
        .compact_if_needed(&mut history, &mut pins, &guard, false, None)
        .await
        .unwrap();
    assert_eq!(summary_count(&history), 1);

    // More turns arrive; a second compaction keeps the old summary and
    // adds a new one.
    for index in 100..104 {
        history
            .append(Message::user_text(format!(
                "question {index}: {}",
                "more ".repeat(120)
            )))
            .unwrap();
        history
            .append(Message::assistant_text(format!("answer {index}")))
            .unwrap();
    }
    let outcome = compactor
        .compact_if_needed(&mut history, &mut pins, &guard, false, None)
        .await
        .unwrap();
    assert!(matches!(outcome, CompactionOutcome::Compacted { .. }));
    assert_eq!(summary_count(&history), 2);
}
