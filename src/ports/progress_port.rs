//! Progress notification port.

use crate::domain::task::TaskStatus;

/// Receives percent-complete updates and lifecycle changes for long-running
/// tasks. Fire-and-forget.
pub trait ProgressPort: Send + Sync {
    fn on_progress(&self, task_id: &str, percent: u8, message: &str);

    /// Every task reports exactly one terminal status, `Completed` or `Failed`.
    fn on_status(&self, task_id: &str, status: &TaskStatus);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressPort for NoProgress {
    fn on_progress(&self, _task_id: &str, _percent: u8, _message: &str) {}

    fn on_status(&self, _task_id: &str, _status: &TaskStatus) {}
}
