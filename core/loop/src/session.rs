//! The session facade hosts drive.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crucible_config::Config;
use crucible_context::CompactionError;
use crucible_context::CompactionOutcome;
use crucible_context::ConversationHistory;
use crucible_context::Compactor;
use crucible_context::HistoryError;
use crucible_context::Pin;
use crucible_context::PinStore;
use crucible_context::Summarizer;
use crucible_context::ToolExecutionGuard;
use crucible_mcp::ClientFactory;
use crucible_mcp::McpPool;
use crucible_policy::ApprovalRequester;
use crucible_protocol::ContentBlock;
use crucible_protocol::Message;
use crucible_protocol::SessionEvent;
use crucible_tools::SpecRegistry;
use crucible_tools::TelemetrySink;
use crucible_tools::ToolCallRuntime;
use crucible_tools::ToolRegistry;
use crucible_tools::ToolRouter;
use crucible_tools::context::BackgroundTask;
use crucible_tools::context::BackgroundTasks;
use crucible_tools::context::TurnContextBuilder;
use crucible_tools::error::ToolError;
use crucible_tools::handlers;
use crucible_tracker::SharedTurnDiffTracker;
use crucible_tracker::TurnDiffTracker;
use crucible_tracker::UndoReport;
use snafu::Snafu;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::driver::TurnDriver;
use crate::fallback::HeadlineSummarizer;
use crate::interrupt::InterruptManager;

/// Grace period for MCP shutdown on close.
const MCP_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Session failures surfaced to the host.
#[derive(Debug, Snafu)]
pub enum SessionError {
    #[snafu(display("tool failure: {source}"), context(false))]
    Tool { source: ToolError },

    #[snafu(display("history violation: {source}"), context(false))]
    History { source: HistoryError },

    #[snafu(display("compaction failed: {source}"), context(false))]
    Compaction { source: CompactionError },
}

/// What processing one assistant message produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// No tool-use blocks; the turn is finished.
    Completed,
    /// Tool results were appended; the host should request the next
    /// assistant message.
    ToolResults(Vec<ContentBlock>),
}

/// One conversation with bounded context and tool execution.
///
/// The session owns the message history, pins, the MCP pool, the spec and
/// handler registries, the interrupt surface, and the event stream. It is
/// driven from the host's single message-loop task.
pub struct Session {
    config: Config,
    history: ConversationHistory,
    pins: PinStore,
    compactor: Compactor,
    in_flight: ToolExecutionGuard,
    driver: TurnDriver,
    mcp: Arc<McpPool>,
    approval: Option<Arc<dyn ApprovalRequester>>,
    interrupts: Arc<InterruptManager>,
    telemetry: TelemetrySink,
    background_tasks: BackgroundTasks,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    cwd: PathBuf,
    current_turn: Option<String>,
    last_tracker: Option<SharedTurnDiffTracker>,
    closed: bool,
}

/// Builder wiring the session's collaborators.
pub struct SessionBuilder {
    config: Config,
    cwd: PathBuf,
    summarizer: Arc<dyn Summarizer>,
    approval: Option<Arc<dyn ApprovalRequester>>,
    mcp_factory: Option<ClientFactory>,
    specs: Option<SpecRegistry>,
    extra_handlers: Vec<(String, Arc<dyn crucible_tools::ToolHandler>)>,
}

impl SessionBuilder {
    pub fn new(config: Config, cwd: impl Into<PathBuf>) -> Self {
        Self {
            config,
            cwd: cwd.into(),
            summarizer: Arc::new(HeadlineSummarizer),
            approval: None,
            mcp_factory: None,
            specs: None,
            extra_handlers: Vec::new(),
        }
    }

    /// Use a model-backed summarizer instead of the extractive fallback.
    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn approval(mut self, approval: Arc<dyn ApprovalRequester>) -> Self {
        self.approval = Some(approval);
        self
    }

    /// Factory that connects MCP clients for the configured servers.
    pub fn mcp_factory(mut self, factory: ClientFactory) -> Self {
        self.mcp_factory = Some(factory);
        self
    }

    /// Replace the builtin spec table.
    pub fn specs(mut self, specs: SpecRegistry) -> Self {
        self.specs = Some(specs);
        self
    }

    /// Register an additional handler under a tool name.
    pub fn handler(
        mut self,
        name: impl Into<String>,
        handler: Arc<dyn crucible_tools::ToolHandler>,
    ) -> Self {
        self.extra_handlers.push((name.into(), handler));
        self
    }

    pub fn build(self) -> Session {
        let telemetry = TelemetrySink::new();
        let specs = Arc::new(self.specs.unwrap_or_else(SpecRegistry::with_builtins));

        let mut registry = ToolRegistry::new(telemetry.clone());
        handlers::register_builtins(&mut registry);
        registry.register("mcp", Arc::new(handlers::McpHandler));
        for (name, handler) in self.extra_handlers {
            registry.register(name, handler);
        }

        let mcp = Arc::new(match self.mcp_factory {
            Some(factory) => McpPool::new(self.config.mcp.definitions.clone(), factory),
            None => McpPool::empty(),
        });

        let router = Arc::new(ToolRouter::new(specs, registry));
        let mut runtime = ToolCallRuntime::new(Arc::clone(&router));
        if let Some(limit) = self.config.tools.limits.max_in_flight {
            runtime = runtime.with_max_in_flight(limit);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let driver = TurnDriver::new(router, runtime, events_tx.clone());
        let compactor = Compactor::new(
            self.config.compaction.clone().into(),
            self.summarizer,
        );

        Session {
            config: self.config,
            history: ConversationHistory::new(),
            pins: PinStore::default(),
            compactor,
            in_flight: ToolExecutionGuard::new(),
            driver,
            mcp,
            approval: self.approval,
            interrupts: Arc::new(InterruptManager::new()),
            telemetry,
            background_tasks: Arc::new(Mutex::new(HashMap::new())),
            events_rx,
            events_tx,
            cwd: self.cwd,
            current_turn: None,
            last_tracker: None,
            closed: false,
        }
    }
}

impl Session {
    /// Start a turn from user input. Returns the turn id.
    pub fn submit_user_turn(&mut self, text: impl Into<String>) -> Result<String, SessionError> {
        let turn_id = Uuid::new_v4().to_string();
        self.history.append(Message::user_text(text))?;
        self.interrupts.clear();
        self.interrupts.arm();
        self.current_turn = Some(turn_id.clone());
        self.emit(SessionEvent::TaskStarted {
            turn_id: turn_id.clone(),
        });
        info!(turn_id = %turn_id, "turn started");
        Ok(turn_id)
    }

    /// Install the system prompt; must precede the first user turn.
    pub fn set_system_prompt(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.history.append(Message::system_text(text))?;
        Ok(())
    }

    /// Feed one assistant message through the core: execute its tool
    /// calls, append the results, and compact when the budget demands.
    pub async fn process_assistant_message(
        &mut self,
        message: Message,
    ) -> Result<TurnOutcome, SessionError> {
        let text = message.text();
        let calls = match self.driver.collect_calls(&message.content) {
            Ok(calls) => calls,
            Err(err) => {
                self.emit(SessionEvent::TaskFailed {
                    error: err.to_string(),
                });
                return Err(err.into());
            }
        };
        self.history.append(message)?;
        if !text.is_empty() {
            self.emit(SessionEvent::AssistantMessage { text: text.clone() });
        }

        if calls.is_empty() {
            self.emit(SessionEvent::TaskComplete { summary: text });
            self.current_turn = None;
            return Ok(TurnOutcome::Completed);
        }

        let turn_id = self
            .current_turn
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let tracker: SharedTurnDiffTracker = Arc::new(TurnDiffTracker::new(turn_id.clone()));
        let turn = {
            let mut builder = TurnContextBuilder::new(&turn_id, &self.cwd)
                .policy(self.config.execution.clone())
                .limits(self.config.tools.limits.clone())
                .mcp(Arc::clone(&self.mcp))
                .cancel_token(self.interrupts.current_token())
                .background_tasks(Arc::clone(&self.background_tasks));
            if let Some(approval) = &self.approval {
                builder = builder.approval(Arc::clone(approval));
            }
            Arc::new(builder.build())
        };

        let guard = self.in_flight.begin();
        let batch = self
            .driver
            .run_tool_batch(
                Arc::clone(&turn),
                Arc::clone(&tracker),
                &turn_id,
                calls,
                self.interrupts.current_token(),
            )
            .await;
        drop(guard);
        self.last_tracker = Some(tracker);

        let blocks = match batch {
            Ok(blocks) => blocks,
            Err(err) => {
                self.emit(SessionEvent::TaskFailed {
                    error: err.to_string(),
                });
                return Err(err.into());
            }
        };

        self.history.append_tool_results(blocks.clone())?;
        self.compact(false, None).await?;
        Ok(TurnOutcome::ToolResults(blocks))
    }

    /// Run compaction, forced or threshold-driven.
    pub async fn compact(
        &mut self,
        force: bool,
        focus: Option<&str>,
    ) -> Result<CompactionOutcome, SessionError> {
        let outcome = self
            .compactor
            .compact_if_needed(&mut self.history, &mut self.pins, &self.in_flight, force, focus)
            .await?;
        if let CompactionOutcome::Compacted {
            pre_tokens,
            post_tokens,
            ..
        } = outcome
        {
            self.emit(SessionEvent::Compaction {
                pre_tokens,
                post_tokens,
            });
        }
        Ok(outcome)
    }

    /// Fire the interrupt for the current turn.
    pub fn interrupt(&self) -> bool {
        self.interrupts.fire()
    }

    pub fn interrupts(&self) -> &Arc<InterruptManager> {
        &self.interrupts
    }

    /// Next pending event, if any.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Await the next event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn pins(&mut self) -> &mut PinStore {
        &mut self.pins
    }

    /// Add a pin that survives compaction.
    pub fn pin(&mut self, pin: Pin) -> Vec<String> {
        self.pins.insert(pin)
    }

    pub fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Background shell tasks started so far.
    pub async fn background_tasks(&self) -> Vec<BackgroundTask> {
        self.background_tasks.lock().await.values().cloned().collect()
    }

    /// The last turn's diff tracker, for summaries and diffs.
    pub fn last_tracker(&self) -> Option<&SharedTurnDiffTracker> {
        self.last_tracker.as_ref()
    }

    /// Undo the last turn's filesystem effects.
    pub fn undo_turn(&mut self) -> Option<Result<UndoReport, crucible_tracker::TrackerError>> {
        self.last_tracker.as_ref().map(|tracker| tracker.undo())
    }

    /// Shut down pooled resources. Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.mcp.close_all(MCP_SHUTDOWN_GRACE).await;
        info!("session closed");
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("messages", &self.history.len())
            .field("tokens", &self.history.total_tokens())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "session.test.rs"]
mod tests;
