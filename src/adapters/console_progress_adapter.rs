//! Progress sink for the command line: a status line on stderr per update.

use crate::domain::task::TaskStatus;
use crate::ports::progress_port::ProgressPort;
use std::sync::Mutex;
use tracing::trace;

/// Prints `[task] NN% message`, skipping repeats of the same percent so a
/// large symbol list does not flood the terminal.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    last_percent: Mutex<Option<u8>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn should_print(&self, percent: u8) -> bool {
        let mut last = self.last_percent.lock().unwrap_or_else(|e| e.into_inner());
        if *last == Some(percent) {
            return false;
        }
        *last = Some(percent);
        true
    }
}

impl ProgressPort for ConsoleProgress {
    fn on_progress(&self, task_id: &str, percent: u8, message: &str) {
        trace!(task_id, percent, message, "progress");
        if self.should_print(percent) {
            eprintln!("[{task_id}] {percent:>3}% {message}");
        }
    }

    fn on_status(&self, task_id: &str, status: &TaskStatus) {
        trace!(task_id, status = status.name(), "status");
        if status.is_terminal() {
            eprintln!("[{task_id}] {status}");
        }
    }
}
