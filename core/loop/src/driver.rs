//! Driving one assistant turn's tool batch.

use std::sync::Arc;

use crucible_protocol::ContentBlock;
use crucible_protocol::SessionEvent;
use crucible_protocol::ToolCall;
use crucible_protocol::ToolPayload;
use crucible_tools::ToolCallRuntime;
use crucible_tools::ToolRouter;
use crucible_tools::context::TurnContext;
use crucible_tools::error::Result;
use crucible_tracker::SharedTurnDiffTracker;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Longest input preview attached to `ToolCallBegin` events.
const INPUT_PREVIEW_CHARS: usize = 120;

/// Executes tool batches and narrates them over the event channel.
pub struct TurnDriver {
    router: Arc<ToolRouter>,
    runtime: ToolCallRuntime,
    events: UnboundedSender<SessionEvent>,
}

impl TurnDriver {
    pub fn new(
        router: Arc<ToolRouter>,
        runtime: ToolCallRuntime,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            router,
            runtime,
            events,
        }
    }

    pub fn router(&self) -> &Arc<ToolRouter> {
        &self.router
    }

    /// Parse an assistant message's blocks into an ordered batch.
    pub fn collect_calls(&self, blocks: &[ContentBlock]) -> Result<Vec<ToolCall>> {
        let mut calls = Vec::new();
        for block in blocks {
            if let Some(call) = self.router.build_tool_call(block)? {
                calls.push(call);
            }
        }
        Ok(calls)
    }

    /// Run a batch to completion, emitting begin/end events per call.
    ///
    /// The returned blocks are in the order of the originating tool-use
    /// blocks (I1 ordering), regardless of completion order.
    pub async fn run_tool_batch(
        &self,
        turn: Arc<TurnContext>,
        tracker: SharedTurnDiffTracker,
        sub_id: &str,
        calls: Vec<ToolCall>,
        cancel: CancellationToken,
    ) -> Result<Vec<ContentBlock>> {
        for call in &calls {
            self.emit(SessionEvent::ToolCallBegin {
                call_id: call.call_id.clone(),
                name: call.tool_name.clone(),
                input_preview: input_preview(&call.payload),
            });
        }

        let blocks = self
            .runtime
            .run_batch(turn, tracker, sub_id, calls, cancel)
            .await?;

        let telemetry = self.router.registry().telemetry().snapshot();
        for block in &blocks {
            if let ContentBlock::ToolResult {
                tool_use_id,
                is_error,
                ..
            } = block
            {
                let recorded = telemetry
                    .iter()
                    .rev()
                    .find(|event| event.call_id == *tool_use_id);
                self.emit(SessionEvent::ToolCallEnd {
                    call_id: tool_use_id.clone(),
                    success: !is_error,
                    duration_ms: recorded.map(|event| event.duration_ms).unwrap_or(0),
                    truncated: recorded.map(|event| event.truncated).unwrap_or(false),
                });
            }
        }
        Ok(blocks)
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

fn input_preview(payload: &ToolPayload) -> String {
    let raw = match payload {
        ToolPayload::Function { raw_arguments }
        | ToolPayload::UnifiedExec { raw_arguments }
        | ToolPayload::Mcp { raw_arguments, .. } => raw_arguments.clone(),
        ToolPayload::LocalShell { params } => params.command.join(" "),
        ToolPayload::Custom { raw_input, .. } => raw_input.clone(),
    };
    let mut preview: String = raw.chars().take(INPUT_PREVIEW_CHARS).collect();
    if preview.len() < raw.len() {
        preview.push('…');
    }
    preview
}

#[cfg(test)]
#[path = "driver.test.rs"]
mod tests;
