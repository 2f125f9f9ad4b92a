use super::*;
use crate::context::TurnContextBuilder;
use crate::handler::ToolHandler;
use crate::handler::ToolKind;
use crate::registry::ToolRegistry;
use crate::spec::SpecRegistry;
use crate::telemetry::TelemetrySink;
use crucible_error::ErrorKind;
use crucible_protocol::ParamSchema;
use crucible_protocol::ToolOutput;
use crucible_protocol::ToolPayload;
use crucible_protocol::ToolSpec;
use crucible_tracker::TurnDiffTracker;
use pretty_assertions::assert_eq;

struct SleepHandler {
    duration: Duration,
}

#[async_trait::async_trait]
impl ToolHandler for SleepHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: crate::context::ToolInvocation) -> Result<ToolOutput> {
        tokio::time::sleep(self.duration).await;
        Ok(ToolOutput::text(format!("done {}", invocation.call_id)))
    }
}

struct LockAndSleepHandler;

#[async_trait::async_trait]
impl ToolHandler for LockAndSleepHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: crate::context::ToolInvocation) -> Result<ToolOutput> {
        let _guard = invocation
            .tracker
            .lock_file_guard(std::path::Path::new("/work/locked.txt"))
            .map_err(|err| {
                tool_error::ConflictSnafu {
                    message: err.to_string(),
                }
                .build()
            })?;
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ToolOutput::text("never reached"))
    }
}

struct FatalHandler;

#[async_trait::async_trait]
impl ToolHandler for FatalHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, _invocation: crate::context::ToolInvocation) -> Result<ToolOutput> {
        Err(tool_error::ProtocolSnafu {
            message: "wire contract broken",
        }
        .build())
    }
}

fn spec(name: &str, supports_parallel: bool) -> ToolSpec {
    ToolSpec::new(name, "test tool", ParamSchema::empty_object(), supports_parallel)
}

fn runtime_with(
    entries: Vec<(&str, bool, Arc<dyn ToolHandler>)>,
) -> ToolCallRuntime {
    let mut specs = SpecRegistry::new();
    let mut registry = ToolRegistry::new(TelemetrySink::new());
    for (name, supports_parallel, handler) in entries {
        specs.register(spec(name, supports_parallel));
        registry.register(name, handler);
    }
    ToolCallRuntime::new(Arc::new(ToolRouter::new(Arc::new(specs), registry)))
}

fn call(tool_name: &str, call_id: &str) -> ToolCall {
    ToolCall {
        tool_name: tool_name.to_string(),
        call_id: call_id.to_string(),
        payload: ToolPayload::Function {
            raw_arguments: "{}".to_string(),
        },
    }
}

fn batch_env() -> (Arc<TurnContext>, SharedTurnDiffTracker) {
    (
        Arc::new(TurnContextBuilder::new("turn-1", "/work").build()),
        Arc::new(TurnDiffTracker::new("turn-1")),
    )
}

fn sleeper(duration_ms: u64) -> Arc<dyn ToolHandler> {
    Arc::new(SleepHandler {
        duration: Duration::from_millis(duration_ms),
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_safe_calls_overlap() {
    let runtime = runtime_with(vec![("nap", true, sleeper(300))]);
    let (turn, tracker) = batch_env();

    let started = Instant::now();
    let results = runtime
        .run_batch(
            turn,
            tracker,
            "sub-1",
            vec![call("nap", "call-1"), call("nap", "call-2")],
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 2);
    assert!(
        elapsed < Duration::from_millis(450),
        "parallel batch took {elapsed:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn non_parallel_calls_serialize() {
    let runtime = runtime_with(vec![("mutate", false, sleeper(300))]);
    let (turn, tracker) = batch_env();

    let started = Instant::now();
    let results = runtime
        .run_batch(
            turn,
            tracker,
            "sub-1",
            vec![call("mutate", "call-1"), call("mutate", "call-2")],
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 2);
    assert!(
        elapsed >= Duration::from_millis(550),
        "serial batch took {elapsed:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn result_order_matches_input_order() {
    let runtime = runtime_with(vec![
        ("slow", true, sleeper(300)),
        ("fast", true, sleeper(10)),
    ]);
    let (turn, tracker) = batch_env();

    let results = runtime
        .run_batch(
            turn,
            tracker,
            "sub-1",
            vec![call("slow", "call-slow"), call("fast", "call-fast")],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = results
        .iter()
        .map(|block| match block {
            ContentBlock::ToolResult { tool_use_id, .. } => tool_use_id.as_str(),
            other => panic!("unexpected block: {other:?}"),
        })
        .collect();
    assert_eq!(ids, vec!["call-slow", "call-fast"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupt_cancels_unfinished_calls_and_releases_locks() {
    let runtime = runtime_with(vec![
        ("quick", true, sleeper(10)),
        ("stuck", true, Arc::new(LockAndSleepHandler)),
    ]);
    let (turn, tracker) = batch_env();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let results = runtime
        .run_batch(
            Arc::clone(&turn),
            Arc::clone(&tracker),
            "sub-1",
            vec![call("quick", "call-1"), call("stuck", "call-2")],
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    match &results[0] {
        ContentBlock::ToolResult { is_error, .. } => assert!(!is_error),
        other => panic!("unexpected block: {other:?}"),
    }
    match &results[1] {
        ContentBlock::ToolResult {
            content, is_error, ..
        } => {
            assert!(is_error);
            assert!(content.contains("cancelled"), "content: {content}");
        }
        other => panic!("unexpected block: {other:?}"),
    }

    // The cancelled handler's lock guard must have been dropped.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(tracker.locked_paths().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn guard_wait_is_bounded() {
    let runtime = runtime_with(vec![
        ("mutate", false, sleeper(500)),
        ("reader", true, sleeper(10)),
    ])
    .with_guard_timeout(Duration::from_millis(100));
    let (turn, tracker) = batch_env();

    // Start the writer alone so it owns the guard, then send the reader in
    // behind it; the reader queues and gives up at the 100ms bound.
    let writer_runtime = runtime.clone();
    let writer_turn = Arc::clone(&turn);
    let writer_tracker = Arc::clone(&tracker);
    let writer = tokio::spawn(async move {
        writer_runtime
            .run_batch(
                writer_turn,
                writer_tracker,
                "sub-1",
                vec![call("mutate", "call-1")],
                CancellationToken::new(),
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let results = runtime
        .run_batch(
            turn,
            tracker,
            "sub-1",
            vec![call("reader", "call-2")],
            CancellationToken::new(),
        )
        .await
        .unwrap();
    writer.await.unwrap().unwrap();

    match &results[0] {
        ContentBlock::ToolResult {
            content, is_error, ..
        } => {
            assert!(is_error);
            assert!(content.contains("timed out"), "content: {content}");
        }
        other => panic!("unexpected block: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fatal_failure_aborts_the_batch() {
    let runtime = runtime_with(vec![
        ("broken", false, Arc::new(FatalHandler)),
        ("nap", true, sleeper(10)),
    ]);
    let (turn, tracker) = batch_env();

    let err = runtime
        .run_batch(
            turn,
            tracker,
            "sub-1",
            vec![call("broken", "call-1"), call("nap", "call-2")],
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn max_in_flight_throttles_parallel_calls() {
    let runtime =
        runtime_with(vec![("nap", true, sleeper(200))]).with_max_in_flight(1);
    let (turn, tracker) = batch_env();

    let started = Instant::now();
    runtime
        .run_batch(
            turn,
            tracker,
            "sub-1",
            vec![call("nap", "call-1"), call("nap", "call-2")],
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(380));
}
