//! Session bootstrap: one request to the gateway to pick up the session
//! cookies tile requests need.

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::core::RequestBuilder;
use crate::data::{FailureKind, FetchResponse};
use crate::effects::cookie_store::CookieStore;
use crate::effects::dispatcher::Dispatcher;
use crate::effects::handle::RequestHandle;
use crate::effects::main_loop::{MainExecutor, Task};
use crate::effects::responder::Responder;
use crate::logging::HttpLogger;

/// Issues session requests and signals their completion on the main
/// executor.
#[derive(Clone)]
pub struct SessionBootstrap {
    gateway: String,
    executor: Arc<dyn MainExecutor>,
    cookies: Arc<CookieStore>,
    logger: Arc<HttpLogger>,
}

impl SessionBootstrap {
    pub fn new(
        gateway: impl Into<String>,
        executor: Arc<dyn MainExecutor>,
        cookies: Arc<CookieStore>,
        logger: Arc<HttpLogger>,
    ) -> Self {
        Self {
            gateway: gateway.into(),
            executor,
            cookies,
            logger,
        }
    }

    /// Gateway URL for `token`. The token is appended as is.
    pub fn gateway_url(&self, token: &str) -> String {
        format!("{}{token}", self.gateway)
    }

    /// Request `url` with only the identifying header.
    ///
    /// `on_complete` is posted to the main executor exactly once: after the
    /// response, after a failure, after cancellation, or right away when
    /// `url` cannot be requested at all.
    pub fn start(
        &self,
        url: &str,
        builder: &RequestBuilder,
        dispatcher: &Arc<Dispatcher>,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Option<RequestHandle> {
        let signal = CompletionSignal {
            executor: Arc::clone(&self.executor),
            on_complete: Some(Box::new(on_complete)),
        };

        let request = match builder.build_plain(url) {
            Ok(request) => request,
            Err(e) => {
                warn!("Failed to initialize session cookie: {e}");
                drop(signal);
                return None;
            }
        };

        debug!("Initializing session cookie");
        let handle = RequestHandle::new(None, request.url().as_str(), Arc::clone(&self.logger));
        let responder = SessionResponder {
            url: request.url().clone(),
            cookies: Arc::clone(&self.cookies),
            signal,
        };
        dispatcher.submit(request, handle.clone(), Box::new(responder));
        Some(handle)
    }
}

/// Posts the completion callback once, at the latest when dropped.
struct CompletionSignal {
    executor: Arc<dyn MainExecutor>,
    on_complete: Option<Task>,
}

impl CompletionSignal {
    fn fire(&mut self) {
        if let Some(task) = self.on_complete.take() {
            self.executor.post(task);
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        self.fire();
    }
}

struct SessionResponder {
    url: Url,
    cookies: Arc<CookieStore>,
    signal: CompletionSignal,
}

impl Responder for SessionResponder {
    fn on_response(mut self: Box<Self>, response: FetchResponse) {
        if response.is_success() {
            let names: Vec<String> = self.cookies.load(&self.url).into_iter().map(|c| c.name).collect();
            debug!("Session cookie initialized, cookies: [{}]", names.join(", "));
        } else {
            debug!("Session cookie request returned status {}", response.status);
        }
        self.signal.fire();
    }

    fn on_failure(mut self: Box<Self>, kind: FailureKind, message: String) {
        debug!("Session cookie request failed ({kind}): {message}");
        self.signal.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::effects::main_loop::MainLoop;

    #[test]
    fn token_is_appended_to_gateway() {
        let session = SessionBootstrap::new(
            "https://gateway.example/1/1/3.mvt?token=",
            Arc::new(MainLoop::new()),
            Arc::new(CookieStore::new()),
            Arc::new(HttpLogger::default()),
        );
        assert_eq!(session.gateway_url("abc"), "https://gateway.example/1/1/3.mvt?token=abc");
        assert_eq!(session.gateway_url(""), "https://gateway.example/1/1/3.mvt?token=");
    }

    #[test]
    fn signal_fires_once_even_when_dropped() {
        let main = Arc::new(MainLoop::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut signal = CompletionSignal {
            executor: main.clone(),
            on_complete: Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        };
        signal.fire();
        drop(signal);
        assert_eq!(main.run_pending(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
