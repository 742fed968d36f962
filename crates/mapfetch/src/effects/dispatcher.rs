//! Bounded execution of outbound requests.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{error, trace};

use crate::core::{OutboundRequest, classify_error};
use crate::data::{ClassifiedOutcome, FailureKind};
use crate::effects::handle::RequestHandle;
use crate::effects::responder::{Responder, deliver};
use crate::effects::response::read_response;
use crate::effects::transport::HttpTransport;
use crate::logging::HttpLogger;

/// Decrements a counter when dropped, including when the task owning it is
/// aborted.
struct CountGuard<'a>(&'a AtomicUsize);

impl<'a> CountGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Removes a request from the outstanding set when its task ends.
struct Outstanding<'a> {
    calls: &'a Mutex<HashMap<u64, RequestHandle>>,
    id: u64,
}

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        self.calls.lock().remove(&self.id);
    }
}

/// Forgets a host's semaphore once no request holds or waits for it.
struct HostLease<'a> {
    dispatcher: &'a Dispatcher,
    host: &'a str,
}

impl Drop for HostLease<'_> {
    fn drop(&mut self) {
        self.dispatcher.prune_host(self.host);
    }
}

/// Runs requests on a worker pool without exceeding a global cap and a
/// per-host cap on active transfers.
///
/// A request waits for its host permit first and the global permit second,
/// so a busy host cannot hold global slots it is not allowed to use.
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
    runtime: Handle,
    logger: Arc<HttpLogger>,
    max_requests: usize,
    max_requests_per_host: usize,
    global: Arc<Semaphore>,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<HashMap<u64, RequestHandle>>,
    running: AtomicUsize,
    queued: AtomicUsize,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        runtime: Handle,
        logger: Arc<HttpLogger>,
        max_requests: usize,
        max_requests_per_host: usize,
    ) -> Self {
        let max_requests = max_requests.max(1);
        let max_requests_per_host = max_requests_per_host.max(1);
        Self {
            transport,
            runtime,
            logger,
            max_requests,
            max_requests_per_host,
            global: Arc::new(Semaphore::new(max_requests)),
            hosts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            running: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
        }
    }

    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn max_requests_per_host(&self) -> usize {
        self.max_requests_per_host
    }

    /// Requests holding permits, i.e. with network I/O in progress.
    pub fn running_calls_count(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Requests waiting for a host or global permit.
    pub fn queued_calls_count(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Hosts with a live semaphore.
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.lock().len()
    }

    fn prune_host(&self, host: &str) {
        let mut hosts = self.hosts.lock();
        let idle = hosts.get(host).is_some_and(|semaphore| {
            Arc::strong_count(semaphore) == 1 && semaphore.available_permits() == self.max_requests_per_host
        });
        if idle {
            hosts.remove(host);
        }
    }

    fn host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock();
        Arc::clone(
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_requests_per_host))),
        )
    }

    /// Schedule `request`. Never blocks; the result reaches `responder` on a
    /// worker thread unless `handle` is cancelled first.
    pub fn submit(self: &Arc<Self>, request: OutboundRequest, handle: RequestHandle, responder: Box<dyn Responder>) {
        if !handle.mark_dispatched() {
            trace!(url = %request.url(), "request cancelled before dispatch");
            return;
        }

        self.calls.lock().insert(handle.id(), handle.clone());
        let this = Arc::clone(self);
        let task_handle = handle.clone();
        let task = self
            .runtime
            .spawn(async move { this.run(request, task_handle, responder).await });
        handle.bind_abort(task.abort_handle());
    }

    async fn run(self: Arc<Self>, request: OutboundRequest, handle: RequestHandle, responder: Box<dyn Responder>) {
        let _outstanding = Outstanding {
            calls: &self.calls,
            id: handle.id(),
        };

        let _lease = HostLease {
            dispatcher: &*self,
            host: request.host(),
        };
        let queued = CountGuard::new(&self.queued);
        let permits = match self.host_semaphore(request.host()).acquire_owned().await {
            Ok(host_permit) => match Arc::clone(&self.global).acquire_owned().await {
                Ok(global_permit) => Some((host_permit, global_permit)),
                Err(_) => None,
            },
            Err(_) => None,
        };
        drop(queued);

        let Some(_permits) = permits else {
            self.finish(&request, &handle, responder, None, closed());
            return;
        };
        if handle.is_cancelled() {
            return;
        }

        let _running = CountGuard::new(&self.running);
        trace!(url = %request.url(), host = request.host(), "starting transfer");

        let transfer = async {
            match self.transport.execute(&request).await {
                Ok(response) => {
                    let reason = response.reason.clone();
                    (read_response(response).await, reason)
                }
                Err(e) => (classify_error(&e), None),
            }
        };
        let (outcome, reason) = match AssertUnwindSafe(transfer).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = format!("Request panicked: {}", panic_message(panic.as_ref()));
                error!(url = %request.url(), "{message}");
                (ClassifiedOutcome::failure(FailureKind::Permanent, message), None)
            }
        };
        self.finish(&request, &handle, responder, reason.as_deref(), outcome);
    }

    fn finish(
        &self,
        request: &OutboundRequest,
        handle: &RequestHandle,
        responder: Box<dyn Responder>,
        reason: Option<&str>,
        outcome: ClassifiedOutcome,
    ) {
        if !handle.complete() {
            return;
        }
        match &outcome {
            ClassifiedOutcome::Success(response) => self.logger.log_response(response.status, reason),
            ClassifiedOutcome::Failure { kind, message } => {
                self.logger.log_failure(*kind, message, request.url().as_str())
            }
        }
        deliver(responder, outcome);
    }

    /// Cancel every request submitted to this dispatcher that has not
    /// completed yet.
    pub fn cancel_all(&self) {
        let handles: Vec<RequestHandle> = self.calls.lock().values().cloned().collect();
        for handle in handles {
            handle.cancel();
        }
    }

    /// Stop admitting transfers. Requests still waiting for a permit fail
    /// with a temporary error.
    pub fn close(&self) {
        self.global.close();
        for host in self.hosts.lock().values() {
            host.close();
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

fn closed() -> ClassifiedOutcome {
    ClassifiedOutcome::failure(FailureKind::Temporary, "dispatcher is shut down")
}
