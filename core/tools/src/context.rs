//! Per-turn context and per-call invocations.
//!
//! A [`TurnContext`] is built once per turn and shared by every handler
//! task; a [`ToolInvocation`] is the short-lived value handed to one
//! handler call and does not outlive it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crucible_config::ToolLimits;
use crucible_mcp::McpPool;
use crucible_policy::ApprovalRequester;
use crucible_policy::ExecutionPolicy;
use crucible_protocol::ToolPayload;
use crucible_tracker::SharedTurnDiffTracker;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A background shell task started during the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundTask {
    pub id: String,
    pub command: String,
    pub log_path: PathBuf,
    pub pid: Option<u32>,
}

/// Shared registry of background shell tasks.
pub type BackgroundTasks = Arc<Mutex<HashMap<String, BackgroundTask>>>;

/// Everything a handler may consult during one turn.
#[derive(Clone)]
pub struct TurnContext {
    pub turn_id: String,
    pub cwd: PathBuf,
    pub policy: ExecutionPolicy,
    pub limits: ToolLimits,
    /// Host approval callback; absent means approval requests are denied.
    pub approval: Option<Arc<dyn ApprovalRequester>>,
    pub mcp: Arc<McpPool>,
    /// Fired when the turn is interrupted.
    pub cancel: CancellationToken,
    pub background_tasks: BackgroundTasks,
}

impl TurnContext {
    /// Resolve a handler-supplied path against the turn's working
    /// directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.cwd.join(path)
        }
    }

    /// Whether the turn has been interrupted.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("turn_id", &self.turn_id)
            .field("cwd", &self.cwd)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TurnContext`].
pub struct TurnContextBuilder {
    turn_id: String,
    cwd: PathBuf,
    policy: ExecutionPolicy,
    limits: ToolLimits,
    approval: Option<Arc<dyn ApprovalRequester>>,
    mcp: Option<Arc<McpPool>>,
    cancel: CancellationToken,
    background_tasks: Option<BackgroundTasks>,
}

impl TurnContextBuilder {
    pub fn new(turn_id: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            turn_id: turn_id.into(),
            cwd: cwd.into(),
            policy: ExecutionPolicy::default(),
            limits: ToolLimits::default(),
            approval: None,
            mcp: None,
            cancel: CancellationToken::new(),
            background_tasks: None,
        }
    }

    pub fn policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn limits(mut self, limits: ToolLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn approval(mut self, approval: Arc<dyn ApprovalRequester>) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn mcp(mut self, pool: Arc<McpPool>) -> Self {
        self.mcp = Some(pool);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Share a background-task registry across turns.
    pub fn background_tasks(mut self, tasks: BackgroundTasks) -> Self {
        self.background_tasks = Some(tasks);
        self
    }

    pub fn build(self) -> TurnContext {
        TurnContext {
            turn_id: self.turn_id,
            cwd: self.cwd,
            policy: self.policy,
            limits: self.limits,
            approval: self.approval,
            mcp: self.mcp.unwrap_or_else(|| Arc::new(McpPool::empty())),
            cancel: self.cancel,
            background_tasks: self
                .background_tasks
                .unwrap_or_else(|| Arc::new(Mutex::new(HashMap::new()))),
        }
    }
}

/// Context passed to one handler call.
#[derive(Clone)]
pub struct ToolInvocation {
    pub turn: Arc<TurnContext>,
    pub tracker: SharedTurnDiffTracker,
    /// Stream/subscription tag of the originating submission.
    pub sub_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub payload: ToolPayload,
}

impl std::fmt::Debug for ToolInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvocation")
            .field("call_id", &self.call_id)
            .field("tool_name", &self.tool_name)
            .field("payload", &self.payload.tag())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "context.test.rs"]
mod tests;
