//! Cooperative cancellation and serialized progress delivery for long-running tasks.

use crate::ports::progress_port::ProgressPort;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Lifecycle of a background task. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed { error: String },
}

impl TaskStatus {
    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed { .. })
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Failed { error } => write!(f, "failed: {error}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Cloneable flag checked between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    processed: usize,
    last_percent: u8,
}

/// Wraps a [`ProgressPort`] so that percents seen by the port never decrease,
/// even when items complete on several worker threads.
pub struct ProgressReporter<'a> {
    port: &'a dyn ProgressPort,
    task_id: &'a str,
    state: Mutex<ProgressState>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(port: &'a dyn ProgressPort, task_id: &'a str) -> Self {
        Self {
            port,
            task_id,
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Emits a milestone. A percent below the last one emitted is raised to it.
    pub fn milestone(&self, percent: u8, message: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let percent = percent.min(100).max(state.last_percent);
        state.last_percent = percent;
        self.port.on_progress(self.task_id, percent, message);
    }

    /// Records one finished item out of `total`, mapped linearly onto `[from, to]`.
    pub fn item_done(&self, total: usize, from: u8, to: u8) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.processed += 1;
        let span = to.saturating_sub(from) as usize;
        let scaled = if total == 0 {
            span
        } else {
            state.processed.min(total) * span / total
        };
        let percent = (from as usize + scaled).min(100) as u8;
        let percent = percent.max(state.last_percent);
        state.last_percent = percent;
        let message = format!("processed {}/{} symbols", state.processed, total);
        self.port.on_progress(self.task_id, percent, &message);
    }

    pub fn status(&self, status: &TaskStatus) {
        self.port.on_status(self.task_id, status);
    }
}
