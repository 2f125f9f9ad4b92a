//! The mutex-guarded per-turn tracker.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use similar::TextDiff;
use snafu::Snafu;
use tracing::warn;

use crate::edit::FileAction;
use crate::edit::FileEdit;

/// Handle shared between the scheduler and the handlers of one turn.
pub type SharedTurnDiffTracker = Arc<TurnDiffTracker>;

/// Tracker failures.
#[derive(Debug, Snafu)]
pub enum TrackerError {
    /// Another handler already holds the writer-intent lock for this path.
    #[snafu(display("path is already locked: {}", path.display()))]
    AlreadyLocked { path: PathBuf },

    /// `undo` may run at most once per turn.
    #[snafu(display("turn has already been undone"))]
    AlreadyUndone,
}

/// What an undo pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndoReport {
    /// Human-readable description of each reversal, in execution order.
    pub operations: Vec<String>,
    /// Per-path failures; a failure does not abort the pass.
    pub failures: Vec<String>,
}

#[derive(Debug, Default)]
struct TrackerState {
    edits: Vec<FileEdit>,
    touched: BTreeSet<PathBuf>,
    locked: BTreeSet<PathBuf>,
    conflicts: Vec<String>,
    undone: bool,
}

/// Thread-safe log of one turn's filesystem operations.
///
/// A single mutex covers every public operation; handlers call in from
/// concurrent tasks and the mutex serializes the trail. The serialized
/// order is the order `summary`, `unified_diff`, and `undo` observe.
#[derive(Debug)]
pub struct TurnDiffTracker {
    turn_id: String,
    state: Mutex<TrackerState>,
}

impl TurnDiffTracker {
    pub fn new(turn_id: impl Into<String>) -> Self {
        Self {
            turn_id: turn_id.into(),
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        // A poisoned lock only means another handler panicked mid-record;
        // the trail itself is still append-only and usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark writer intent on a path. Fails fast when the path is already
    /// locked so concurrent-edit bugs surface instead of serializing.
    pub fn lock_file(&self, path: &Path) -> Result<(), TrackerError> {
        let mut state = self.state();
        if !state.locked.insert(path.to_path_buf()) {
            return Err(TrackerError::AlreadyLocked {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Release a writer-intent lock. Unlocking an unheld path is a no-op.
    pub fn unlock_file(&self, path: &Path) {
        self.state().locked.remove(path);
    }

    /// Acquire a writer-intent lock that releases itself on drop, so the
    /// lock cannot leak when the owning task is cancelled mid-handler.
    pub fn lock_file_guard(
        self: &Arc<Self>,
        path: &Path,
    ) -> Result<FileLockGuard, TrackerError> {
        self.lock_file(path)?;
        Ok(FileLockGuard {
            tracker: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }

    /// Paths currently holding writer-intent locks.
    pub fn locked_paths(&self) -> Vec<PathBuf> {
        self.state().locked.iter().cloned().collect()
    }

    /// Record a read along with the hash of what was seen.
    pub fn record_read(&self, path: &Path, tool_name: &str, old_hash: Option<String>) {
        let mut edit = FileEdit::new(path, tool_name, FileAction::Read, None, None);
        edit.old_hash = old_hash;
        let mut state = self.state();
        state.touched.insert(path.to_path_buf());
        state.edits.push(edit);
    }

    /// Record a mutation.
    ///
    /// If the path's previous content-bearing edit disagrees with this
    /// call's `old_content`, a conflict descriptor is appended; the edit is
    /// still recorded.
    pub fn record_edit(
        &self,
        path: &Path,
        tool_name: &str,
        action: FileAction,
        old_content: Option<String>,
        new_content: Option<String>,
    ) {
        let mut state = self.state();

        if let Some(previous) = state
            .edits
            .iter()
            .rev()
            .find(|edit| edit.path == path && edit.new_content.is_some())
        {
            if previous.new_content != old_content {
                let descriptor = format!(
                    "conflict on {}: {} by {tool_name} does not start from the content left by {}",
                    path.display(),
                    action,
                    previous.tool_name,
                );
                warn!(path = %path.display(), "{descriptor}");
                state.conflicts.push(descriptor);
            }
        }

        state.touched.insert(path.to_path_buf());
        state
            .edits
            .push(FileEdit::new(path, tool_name, action, old_content, new_content));
    }

    /// Record a rename from `path` to `to`.
    pub fn record_rename(&self, path: &Path, to: &Path, tool_name: &str) {
        let mut edit = FileEdit::new(path, tool_name, FileAction::Rename, None, None);
        edit.renamed_to = Some(to.to_path_buf());
        let mut state = self.state();
        state.touched.insert(path.to_path_buf());
        state.touched.insert(to.to_path_buf());
        state.edits.push(edit);
    }

    /// Append a free-form conflict descriptor (pre-image mismatches found
    /// by handlers before they write anything).
    pub fn record_conflict(&self, description: impl Into<String>) {
        self.state().conflicts.push(description.into());
    }

    /// Ordered edits for one path.
    pub fn edits_for(&self, path: &Path) -> Vec<FileEdit> {
        self.state()
            .edits
            .iter()
            .filter(|edit| edit.path == path)
            .cloned()
            .collect()
    }

    /// Every path the turn touched.
    pub fn touched_paths(&self) -> Vec<PathBuf> {
        self.state().touched.iter().cloned().collect()
    }

    /// Paths touched by a mutating action.
    pub fn written_paths(&self) -> Vec<PathBuf> {
        let state = self.state();
        let mut written = BTreeSet::new();
        for edit in &state.edits {
            if edit.action.is_mutation() {
                written.insert(edit.path.clone());
                if let Some(to) = &edit.renamed_to {
                    written.insert(to.clone());
                }
            }
        }
        written.into_iter().collect()
    }

    /// Conflict descriptors accumulated so far.
    pub fn conflicts(&self) -> Vec<String> {
        self.state().conflicts.clone()
    }

    /// Whether `undo` already ran for this turn.
    pub fn is_undone(&self) -> bool {
        self.state().undone
    }

    /// Human-readable summary grouped by path.
    pub fn summary(&self) -> String {
        let state = self.state();
        if state.edits.is_empty() && state.conflicts.is_empty() {
            return "no file operations recorded".to_string();
        }

        let mut per_path: BTreeMap<&Path, Vec<&FileEdit>> = BTreeMap::new();
        for edit in &state.edits {
            per_path.entry(edit.path.as_path()).or_default().push(edit);
        }

        let mut lines = Vec::new();
        for (path, edits) in per_path {
            let actions = edits
                .iter()
                .map(|edit| match (&edit.action, &edit.renamed_to) {
                    (FileAction::Rename, Some(to)) => {
                        format!("rename -> {}", to.display())
                    }
                    (action, _) => action.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("{}: {actions}", path.display()));
        }
        for conflict in &state.conflicts {
            lines.push(format!("! {conflict}"));
        }
        lines.join("\n")
    }

    /// Unified diff of the turn: initial old content to final new content
    /// per path. Returns `None` when no content-bearing edits exist.
    pub fn unified_diff(&self) -> Option<String> {
        let state = self.state();

        let mut initial: BTreeMap<&Path, &str> = BTreeMap::new();
        let mut finals: BTreeMap<&Path, &str> = BTreeMap::new();
        for edit in &state.edits {
            if !edit.action.is_mutation() {
                continue;
            }
            let path = edit.path.as_path();
            initial
                .entry(path)
                .or_insert_with(|| edit.old_content.as_deref().unwrap_or(""));
            finals.insert(path, edit.new_content.as_deref().unwrap_or(""));
        }

        if finals.is_empty() {
            return None;
        }

        let mut chunks = Vec::new();
        for (path, new_content) in &finals {
            let old_content = initial.get(path).copied().unwrap_or("");
            if old_content == *new_content {
                continue;
            }
            let diff = TextDiff::from_lines(old_content, *new_content);
            let header_old = format!("a/{}", path.display());
            let header_new = format!("b/{}", path.display());
            chunks.push(
                diff.unified_diff()
                    .context_radius(3)
                    .header(&header_old, &header_new)
                    .to_string(),
            );
        }

        if chunks.is_empty() {
            None
        } else {
            Some(chunks.join("\n"))
        }
    }

    /// Reverse this turn's mutations on disk, newest first.
    ///
    /// Restores previous contents, removes created files, and recreates
    /// deleted files (including missing parent directories). Failures are
    /// accumulated per path; they never abort the pass. Runs at most once
    /// per turn.
    pub fn undo(&self) -> Result<UndoReport, TrackerError> {
        let edits = {
            let mut state = self.state();
            if state.undone {
                return Err(TrackerError::AlreadyUndone);
            }
            state.undone = true;
            state.edits.clone()
        };

        let mut report = UndoReport::default();
        for edit in edits.iter().rev() {
            match edit.action {
                FileAction::Read => {}
                FileAction::Create => {
                    match std::fs::remove_file(&edit.path) {
                        Ok(()) => report
                            .operations
                            .push(format!("removed created file {}", edit.path.display())),
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                        Err(err) => report
                            .failures
                            .push(format!("remove {}: {err}", edit.path.display())),
                    }
                }
                FileAction::Update | FileAction::Delete => {
                    let Some(old_content) = edit.old_content.as_deref() else {
                        report.failures.push(format!(
                            "restore {}: no recorded previous content",
                            edit.path.display()
                        ));
                        continue;
                    };
                    match restore_file(&edit.path, old_content) {
                        Ok(()) => report
                            .operations
                            .push(format!("restored {}", edit.path.display())),
                        Err(err) => report
                            .failures
                            .push(format!("restore {}: {err}", edit.path.display())),
                    }
                }
                FileAction::Rename => {
                    let Some(to) = edit.renamed_to.as_deref() else {
                        report.failures.push(format!(
                            "rename {}: destination not recorded",
                            edit.path.display()
                        ));
                        continue;
                    };
                    match rename_back(to, &edit.path) {
                        Ok(()) => report.operations.push(format!(
                            "moved {} back to {}",
                            to.display(),
                            edit.path.display()
                        )),
                        Err(err) => report
                            .failures
                            .push(format!("move {} back: {err}", to.display())),
                    }
                }
            }
        }

        if !report.failures.is_empty() {
            warn!(
                turn_id = %self.turn_id,
                failures = report.failures.len(),
                "undo completed with failures"
            );
        }
        Ok(report)
    }
}

/// Holds a writer-intent lock on one path; dropping releases it.
#[derive(Debug)]
pub struct FileLockGuard {
    tracker: Arc<TurnDiffTracker>,
    path: PathBuf,
}

impl FileLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        self.tracker.unlock_file(&self.path);
    }
}

/// Write `content` to `path`, creating missing parent directories first.
fn restore_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)
}

fn rename_back(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::rename(from, to)
}

#[cfg(test)]
#[path = "tracker.test.rs"]
mod tests;
