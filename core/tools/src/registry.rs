//! Name → handler dispatch with uniform telemetry and error mapping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use crucible_protocol::TelemetryEvent;
use crucible_protocol::ToolOutput;
use tracing::debug;
use tracing::warn;

use crate::context::ToolInvocation;
use crate::error::Result;
use crate::error::tool_error;
use crate::handler::ToolHandler;
use crate::telemetry::TelemetrySink;

/// The name → handler table for a session.
///
/// `dispatch` is the single entry point: it looks the handler up, checks
/// payload compatibility, runs the handler inside a telemetry span, and
/// leaves severity mapping to the caller. The registry never retries;
/// retry policy belongs to individual handlers.
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    telemetry: TelemetrySink,
}

impl ToolRegistry {
    pub fn new(telemetry: TelemetrySink) -> Self {
        Self {
            handlers: HashMap::new(),
            telemetry,
        }
    }

    /// Register a handler under a tool name. Re-registration warns and the
    /// last handler wins, mirroring spec registration.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!(tool = %name, "overwriting handler registration; last wins");
        }
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).map(Arc::clone)
    }

    pub fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    /// Execute one invocation.
    ///
    /// Errors are returned typed; the router converts respond-to-model
    /// kinds into error tool-results and propagates fatal kinds.
    pub async fn dispatch(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let tool_name = invocation.tool_name.clone();
        let call_id = invocation.call_id.clone();
        let turn_id = invocation.turn.turn_id.clone();
        let input_bytes = invocation.payload.input_bytes();

        // Namespaced `server/tool` names all route through the reserved
        // `mcp` handler.
        let lookup = self.handler(&tool_name).or_else(|| {
            crucible_mcp::parse_mcp_tool_name(&tool_name).and_then(|_| self.handler("mcp"))
        });
        let handler = match lookup {
            Some(handler) => handler,
            None => {
                let err = tool_error::NotFoundSnafu {
                    message: format!("unsupported tool: {tool_name}"),
                }
                .build();
                self.record(&tool_name, &call_id, &turn_id, 0, Err(&err), input_bytes);
                return Err(err);
            }
        };

        if !handler.matches_kind(&invocation.payload) {
            let err = tool_error::ValidationSnafu {
                message: format!(
                    "tool {tool_name} invoked with incompatible payload ({})",
                    invocation.payload.tag()
                ),
            }
            .build();
            self.record(&tool_name, &call_id, &turn_id, 0, Err(&err), input_bytes);
            return Err(err);
        }

        debug!(tool = %tool_name, call_id = %call_id, "dispatching tool call");
        let started = Instant::now();
        let result = handler.handle(invocation).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.record(
            &tool_name,
            &call_id,
            &turn_id,
            elapsed_ms,
            result.as_ref(),
            input_bytes,
        );
        result
    }

    fn record(
        &self,
        tool_name: &str,
        call_id: &str,
        turn_id: &str,
        duration_ms: u64,
        result: std::result::Result<&ToolOutput, &crate::error::ToolError>,
        input_bytes: usize,
    ) {
        let (success, error_kind, output_bytes, truncated) = match result {
            Ok(output) => (
                output.success(),
                None,
                output.output_bytes(),
                output_truncated(output),
            ),
            Err(err) => (false, Some(err.kind().name().to_string()), 0, false),
        };
        self.telemetry.push(TelemetryEvent {
            timestamp: Utc::now(),
            tool_name: tool_name.to_string(),
            call_id: call_id.to_string(),
            turn_id: turn_id.to_string(),
            duration_ms,
            success,
            error_kind,
            input_bytes,
            output_bytes,
            truncated,
        });
    }
}

/// Read the authoritative truncation flag out of a shell envelope's
/// metadata; other outputs are never truncated by the formatter.
fn output_truncated(output: &ToolOutput) -> bool {
    match output {
        ToolOutput::Function {
            metadata: Some(metadata),
            ..
        } => metadata
            .get("truncated")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
        _ => false,
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry")
            .field("handlers", &names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "registry.test.rs"]
mod tests;
