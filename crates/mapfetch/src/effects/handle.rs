//! Lifecycle of one in-flight fetch.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::task::AbortHandle;

use crate::data::CallerHandle;
use crate::logging::HttpLogger;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandleState {
    Created = 0,
    Dispatched = 1,
    Completed = 2,
    Cancelled = 3,
}

impl HandleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => HandleState::Created,
            1 => HandleState::Dispatched,
            2 => HandleState::Completed,
            _ => HandleState::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HandleState::Completed | HandleState::Cancelled)
    }
}

type TerminalHook = Box<dyn FnOnce(&RequestHandle) + Send>;

struct Inner {
    id: u64,
    url: String,
    caller: Option<CallerHandle>,
    state: AtomicU8,
    abort: Mutex<Option<AbortHandle>>,
    on_terminal: Mutex<Option<TerminalHook>>,
    logger: Arc<HttpLogger>,
}

/// Shared handle to one fetch.
///
/// `Created -> Dispatched -> Completed | Cancelled`. Every transition is a
/// single compare-and-swap, so of completion and cancellation exactly one
/// wins. The loser has no effect: a completed request ignores `cancel`, and
/// a cancelled one never delivers its result.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<Inner>,
}

impl RequestHandle {
    pub(crate) fn new(caller: Option<CallerHandle>, url: impl Into<String>, logger: Arc<HttpLogger>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                url: url.into(),
                caller,
                state: AtomicU8::new(HandleState::Created as u8),
                abort: Mutex::new(None),
                on_terminal: Mutex::new(None),
                logger,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn caller(&self) -> Option<CallerHandle> {
        self.inner.caller
    }

    pub fn state(&self) -> HandleState {
        HandleState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == HandleState::Cancelled
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Whether both handles refer to the same request.
    pub fn ptr_eq(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn transition(&self, from: HandleState, to: HandleState) -> bool {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Run `hook` once when the handle reaches a terminal state. Runs
    /// immediately if it already has.
    pub(crate) fn set_terminal_hook(&self, hook: impl FnOnce(&RequestHandle) + Send + 'static) {
        let mut slot = self.inner.on_terminal.lock();
        if self.is_terminal() {
            drop(slot);
            hook(self);
        } else {
            *slot = Some(Box::new(hook));
        }
    }

    fn run_terminal_hook(&self) {
        let hook = self.inner.on_terminal.lock().take();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    pub(crate) fn mark_dispatched(&self) -> bool {
        self.transition(HandleState::Created, HandleState::Dispatched)
    }

    /// Attach the task running this request. A handle cancelled in the
    /// meantime aborts the task right away.
    pub(crate) fn bind_abort(&self, abort: AbortHandle) {
        let mut slot = self.inner.abort.lock();
        if self.is_cancelled() {
            abort.abort();
        } else {
            *slot = Some(abort);
        }
    }

    /// Claim the terminal transition for delivering a result. `false` means
    /// the request was cancelled and the result must be dropped.
    pub(crate) fn complete(&self) -> bool {
        if !self.transition(HandleState::Dispatched, HandleState::Completed) {
            return false;
        }
        self.inner.abort.lock().take();
        self.run_terminal_hook();
        true
    }

    /// Cancel the request. Idempotent and callable from any thread.
    ///
    /// Returns `true` if this call cancelled it, `false` if it had already
    /// completed or been cancelled.
    pub fn cancel(&self) -> bool {
        let mut current = self.state();
        loop {
            if current.is_terminal() {
                return false;
            }
            match self.inner.state.compare_exchange(
                current as u8,
                HandleState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = HandleState::from_u8(actual),
            }
        }

        let abort = self.inner.abort.lock().take();
        if let Some(abort) = abort {
            abort.abort();
        }
        self.inner.logger.log_cancelled(self.url());
        self.run_terminal_hook();
        true
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("caller", &self.inner.caller)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn handle() -> RequestHandle {
        RequestHandle::new(None, "https://tiles.example/1.pbf", Arc::new(HttpLogger::default()))
    }

    #[test]
    fn normal_lifecycle() {
        let h = handle();
        assert_eq!(h.state(), HandleState::Created);
        assert!(h.mark_dispatched());
        assert!(!h.mark_dispatched());
        assert!(h.complete());
        assert_eq!(h.state(), HandleState::Completed);
        assert!(!h.complete());
    }

    #[test]
    fn cancel_after_completion_is_noop() {
        let h = handle();
        h.mark_dispatched();
        assert!(h.complete());
        assert!(!h.cancel());
        assert_eq!(h.state(), HandleState::Completed);
    }

    #[test]
    fn cancel_before_dispatch_blocks_dispatch() {
        let h = handle();
        assert!(h.cancel());
        assert!(!h.cancel());
        assert!(!h.mark_dispatched());
        assert!(!h.complete());
        assert!(h.is_cancelled());
    }

    #[test]
    fn completion_loses_to_earlier_cancel() {
        let h = handle();
        h.mark_dispatched();
        assert!(h.cancel());
        assert!(!h.complete());
    }

    #[test]
    fn racing_cancel_and_complete_have_one_winner() {
        for _ in 0..200 {
            let h = handle();
            h.mark_dispatched();
            let a = h.clone();
            let b = h.clone();
            let t1 = std::thread::spawn(move || a.complete());
            let t2 = std::thread::spawn(move || b.cancel());
            let completed = t1.join().unwrap();
            let cancelled = t2.join().unwrap();
            assert!(completed ^ cancelled);
        }
    }

    #[test]
    fn terminal_hook_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let h = handle();
        let counter = Arc::clone(&runs);
        h.set_terminal_hook(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        h.mark_dispatched();
        h.complete();
        h.cancel();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&runs);
        h.set_terminal_hook(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn late_bound_task_is_aborted() {
        let h = handle();
        h.mark_dispatched();
        h.cancel();
        let task = tokio::spawn(std::future::pending::<()>());
        h.bind_abort(task.abort_handle());
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let h = handle();
        let other = h.clone();
        assert!(h.ptr_eq(&other));
        assert!(!h.ptr_eq(&handle()));
        other.cancel();
        assert!(h.is_cancelled());
    }
}
