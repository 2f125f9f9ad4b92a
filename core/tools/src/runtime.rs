//! The per-turn concurrent scheduler.
//!
//! One reader/writer primitive guards the batch: parallel-safe calls share
//! a read guard, everything else takes the write guard. `tokio`'s RwLock
//! is write-preferring and fair, so readers arriving while a writer waits
//! queue behind it and neither side starves within a bounded batch.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crucible_protocol::ContentBlock;
use crucible_protocol::ToolCall;
use crucible_tracker::SharedTurnDiffTracker;
use tokio::sync::RwLock;
use tokio::sync::Semaphore;
use tokio_util::either::Either;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::debug;
use tracing::error;

use crate::context::TurnContext;
use crate::error::Result;
use crate::error::tool_error;
use crate::router::ToolRouter;
use crate::router::error_result;

/// Default bound on waiting for the batch guard.
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs one assistant turn's batch of tool calls.
///
/// Tasks share the host's event loop; no nested runtime is ever created.
/// Results are returned in the order of the originating tool-use blocks,
/// regardless of completion order.
#[derive(Clone)]
pub struct ToolCallRuntime {
    router: Arc<ToolRouter>,
    guard: Arc<RwLock<()>>,
    guard_timeout: Duration,
    max_in_flight: Option<Arc<Semaphore>>,
}

impl ToolCallRuntime {
    pub fn new(router: Arc<ToolRouter>) -> Self {
        Self {
            router,
            guard: Arc::new(RwLock::new(())),
            guard_timeout: DEFAULT_GUARD_TIMEOUT,
            max_in_flight: None,
        }
    }

    /// Override the guard acquisition timeout.
    pub fn with_guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout = timeout;
        self
    }

    /// Throttle the number of concurrently running calls.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    /// Execute a batch, one task per call.
    ///
    /// On interrupt, completed results are preserved and every unfinished
    /// call yields a cancelled tool-result. A fatal error cancels the rest
    /// of the batch and aborts the turn.
    pub async fn run_batch(
        &self,
        turn: Arc<TurnContext>,
        tracker: SharedTurnDiffTracker,
        sub_id: &str,
        calls: Vec<ToolCall>,
        cancel: CancellationToken,
    ) -> Result<Vec<ContentBlock>> {
        let mut handles = Vec::with_capacity(calls.len());
        for call in calls {
            let task = self.spawn_call(
                Arc::clone(&turn),
                Arc::clone(&tracker),
                sub_id.to_string(),
                call,
                cancel.clone(),
            );
            handles.push(task);
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut fatal = None;
        for (call_id, handle) in handles {
            match handle.await {
                Ok(Ok(block)) => results.push(block),
                Ok(Err(err)) => {
                    error!(call_id = %call_id, kind = %err.kind(), "fatal tool failure; aborting batch");
                    cancel.cancel();
                    fatal.get_or_insert(err);
                }
                Err(join_err) => {
                    error!(call_id = %call_id, error = %join_err, "tool task panicked");
                    cancel.cancel();
                    fatal.get_or_insert(
                        tool_error::SystemSnafu {
                            message: format!("tool task for {call_id} panicked: {join_err}"),
                        }
                        .build(),
                    );
                }
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    fn spawn_call(
        &self,
        turn: Arc<TurnContext>,
        tracker: SharedTurnDiffTracker,
        sub_id: String,
        call: ToolCall,
        cancel: CancellationToken,
    ) -> (String, AbortOnDropHandle<Result<ContentBlock>>) {
        let supports_parallel = self.router.tool_supports_parallel(&call.tool_name);
        let router = Arc::clone(&self.router);
        let lock = Arc::clone(&self.guard);
        let semaphore = self.max_in_flight.clone();
        let guard_timeout = self.guard_timeout;
        let call_id = call.call_id.clone();
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let call_id = call.call_id.clone();
            let tool_name = call.tool_name.clone();
            let work = async {
                let _permit = match semaphore {
                    Some(semaphore) => match semaphore.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            return Err(tool_error::SystemSnafu {
                                message: "scheduler throttle closed",
                            }
                            .build());
                        }
                    },
                    None => None,
                };

                let guard_acquisition = async {
                    if supports_parallel {
                        Either::Left(lock.read().await)
                    } else {
                        Either::Right(lock.write().await)
                    }
                };
                let _guard = match tokio::time::timeout(guard_timeout, guard_acquisition).await {
                    Ok(guard) => guard,
                    Err(_) => {
                        let err = tool_error::TimeoutSnafu {
                            timeout_ms: guard_timeout.as_millis() as u64,
                        }
                        .build();
                        return Ok(error_result(&call_id, &err));
                    }
                };

                router
                    .dispatch_tool_call(turn, tracker, &sub_id, call)
                    .await
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(call_id = %call_id, tool = %tool_name, "tool call cancelled");
                    Ok(cancelled_result(&call_id, started.elapsed()))
                }
                result = work => result,
            }
        });

        (call_id, AbortOnDropHandle::new(handle))
    }
}

/// The tool-result recorded for a call that was interrupted.
fn cancelled_result(call_id: &str, elapsed: Duration) -> ContentBlock {
    let secs = elapsed.as_secs_f32().max(0.1);
    ContentBlock::ToolResult {
        tool_use_id: call_id.to_string(),
        content: format!("cancelled: aborted by user after {secs:.1}s"),
        is_error: true,
    }
}

impl std::fmt::Debug for ToolCallRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallRuntime")
            .field("guard_timeout", &self.guard_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "runtime.test.rs"]
mod tests;
