//! The primary execution context completion signals are posted to.

use tokio::sync::{Mutex, mpsc};
use tracing::trace;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs tasks on the embedder's primary thread, in the
/// order they were posted.
pub trait MainExecutor: Send + Sync {
    fn post(&self, task: Task);
}

/// Runs each task immediately on the posting thread.
///
/// For embedders without a primary thread of their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl MainExecutor for InlineExecutor {
    fn post(&self, task: Task) {
        task();
    }
}

/// A queue of tasks drained by whoever owns the primary thread.
pub struct MainLoop {
    tx: mpsc::UnboundedSender<Task>,
    rx: Mutex<mpsc::UnboundedReceiver<Task>>,
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl MainLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Mutex::new(rx) }
    }

    /// Run every task posted so far without waiting. Returns how many ran.
    ///
    /// Returns 0 if another caller is draining the loop at the same time.
    pub fn run_pending(&self) -> usize {
        let Ok(mut rx) = self.rx.try_lock() else {
            return 0;
        };
        let mut ran = 0;
        while let Ok(task) = rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait for the next task and run it.
    pub async fn run_next(&self) {
        let task = self.rx.lock().await.recv().await;
        if let Some(task) = task {
            task();
        }
    }
}

impl MainExecutor for MainLoop {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            trace!("main loop is gone, dropping task");
        }
    }
}
