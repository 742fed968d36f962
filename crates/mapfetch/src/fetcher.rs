//! The caller-facing fetcher.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mapfetch_platform::Platform;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::core::RequestBuilder;
use crate::data::{CallerHandle, ClassifiedOutcome, Cookie, FetchConfig, FetchRequest};
use crate::effects::{
    CookieStore, Dispatcher, HttpTransport, InlineExecutor, MainExecutor, RequestHandle, Responder,
    SessionBootstrap,
};
use crate::error::{Error, Result};
use crate::logging::HttpLogger;

type Registry = Mutex<HashMap<CallerHandle, RequestHandle>>;

/// Owns the worker pool, the dispatcher and the cookie store, and maps
/// native caller handles to in-flight requests.
///
/// ```no_run
/// use mapfetch::{ClassifiedOutcome, FetchConfig, FetchRequest, ResourceFetcher};
///
/// # fn main() -> mapfetch::Result<()> {
/// let fetcher = ResourceFetcher::new(FetchConfig::default())?;
/// let (_handle, rx) = fetcher.fetch(FetchRequest::new("https://tiles.example/0/0/0.pbf"))?;
/// match rx.blocking_recv() {
///     Ok(ClassifiedOutcome::Success(response)) => println!("{} bytes", response.body.len()),
///     Ok(ClassifiedOutcome::Failure { kind, message }) => eprintln!("{kind}: {message}"),
///     Err(_) => eprintln!("cancelled"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct ResourceFetcher {
    config: FetchConfig,
    platform: Platform,
    runtime: Option<Runtime>,
    handle: Handle,
    builder: RequestBuilder,
    cookies: Arc<CookieStore>,
    logger: Arc<HttpLogger>,
    dispatcher: RwLock<Arc<Dispatcher>>,
    registry: Arc<Registry>,
    executor: Arc<dyn MainExecutor>,
    shut_down: AtomicBool,
}

impl ResourceFetcher {
    /// Start a fetcher with its own worker pool.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("mapfetch-worker")
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        let handle = runtime.handle().clone();
        Self::assemble(config, Platform::current(), Some(runtime), handle)
    }

    /// Start a fetcher that runs its transfers on an existing runtime.
    pub fn with_handle(config: FetchConfig, handle: Handle) -> Result<Self> {
        Self::assemble(config, Platform::current(), None, handle)
    }

    fn assemble(config: FetchConfig, platform: Platform, runtime: Option<Runtime>, handle: Handle) -> Result<Self> {
        let cookies = Arc::new(CookieStore::new());
        let logger = Arc::new(HttpLogger::from_config(&config));
        let builder = RequestBuilder::from_config(&config, &platform);
        let transport = default_transport(&config, &cookies)?;
        let dispatcher = Self::make_dispatcher(&config, &platform, &handle, &logger, transport);

        info!(
            user_agent = builder.user_agent().as_str(),
            max_requests = dispatcher.max_requests(),
            max_requests_per_host = dispatcher.max_requests_per_host(),
            "resource fetcher started"
        );

        Ok(Self {
            config,
            platform,
            runtime,
            handle,
            builder,
            cookies,
            logger,
            dispatcher: RwLock::new(dispatcher),
            registry: Arc::new(Mutex::new(HashMap::new())),
            executor: Arc::new(InlineExecutor),
            shut_down: AtomicBool::new(false),
        })
    }

    fn make_dispatcher(
        config: &FetchConfig,
        platform: &Platform,
        handle: &Handle,
        logger: &Arc<HttpLogger>,
        transport: Arc<dyn HttpTransport>,
    ) -> Arc<Dispatcher> {
        let per_host = config
            .max_requests_per_host
            .unwrap_or_else(|| platform.tier.max_requests_per_host());
        Arc::new(Dispatcher::new(
            transport,
            handle.clone(),
            Arc::clone(logger),
            config.max_requests,
            per_host,
        ))
    }

    /// Use `platform` for the identifying header and the per-host default.
    #[must_use]
    pub fn on_platform(mut self, platform: Platform) -> Self {
        self.builder = RequestBuilder::from_config(&self.config, &platform);
        let transport = self.dispatcher().transport();
        let dispatcher = Self::make_dispatcher(&self.config, &platform, &self.handle, &self.logger, transport);
        *self.dispatcher.get_mut() = dispatcher;
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_transport(self, transport: Arc<dyn HttpTransport>) -> Self {
        self.swap_transport(transport);
        self
    }

    /// Where session completion callbacks are posted.
    ///
    /// Without one, callbacks run inline on the worker thread that finished
    /// the session request. Embedders that need them on their primary thread
    /// install a [`MainLoop`](crate::MainLoop) or their own executor here.
    #[must_use]
    pub fn with_main_executor(mut self, executor: Arc<dyn MainExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn request_builder(&self) -> &RequestBuilder {
        &self.builder
    }

    pub fn cookie_store(&self) -> &Arc<CookieStore> {
        &self.cookies
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher.read())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            Err(Error::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Issue a fetch on behalf of `caller`.
    ///
    /// The result reaches `responder` later, on a worker thread. A live
    /// request already registered for `caller` is cancelled first.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedUrl`] or [`Error::InvalidHeader`] when the request
    /// cannot be built, [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    /// The responder is not called in these cases.
    pub fn execute_request(
        &self,
        caller: CallerHandle,
        request: FetchRequest,
        responder: Box<dyn Responder>,
    ) -> Result<RequestHandle> {
        self.ensure_running()?;
        let outbound = self.builder.build(&request)?;
        let handle = RequestHandle::new(Some(caller), outbound.url().as_str(), Arc::clone(&self.logger));

        let stale = self.registry.lock().insert(caller, handle.clone());
        if let Some(stale) = stale {
            debug!(caller = %caller, "caller handle reused, cancelling previous request");
            stale.cancel();
        }

        let registry = Arc::downgrade(&self.registry);
        handle.set_terminal_hook(move |finished| {
            if let Some(registry) = registry.upgrade() {
                let mut registry = registry.lock();
                if registry.get(&caller).is_some_and(|current| current.ptr_eq(finished)) {
                    registry.remove(&caller);
                }
            }
        });

        self.dispatcher().submit(outbound, handle.clone(), responder);
        Ok(handle)
    }

    /// Cancel the request registered for `caller`. Returns whether a live
    /// request was cancelled.
    pub fn cancel_request(&self, caller: CallerHandle) -> bool {
        let handle = self.registry.lock().remove(&caller);
        handle.is_some_and(|handle| handle.cancel())
    }

    /// Issue a fetch whose result arrives on a oneshot channel. The channel
    /// closes without a value if the request is cancelled.
    pub fn fetch(&self, request: FetchRequest) -> Result<(RequestHandle, oneshot::Receiver<ClassifiedOutcome>)> {
        self.ensure_running()?;
        let outbound = self.builder.build(&request)?;
        let handle = RequestHandle::new(None, outbound.url().as_str(), Arc::clone(&self.logger));
        let (tx, rx) = oneshot::channel();
        self.dispatcher().submit(outbound, handle.clone(), Box::new(tx));
        Ok((handle, rx))
    }

    pub fn in_flight_count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn running_calls_count(&self) -> usize {
        self.dispatcher().running_calls_count()
    }

    pub fn queued_calls_count(&self) -> usize {
        self.dispatcher().queued_calls_count()
    }

    /// Cancel every registered request and everything on the current
    /// dispatcher.
    pub fn cancel_all(&self) {
        let registered: Vec<RequestHandle> = self.registry.lock().drain().map(|(_, h)| h).collect();
        for handle in registered {
            handle.cancel();
        }
        self.dispatcher().cancel_all();
    }

    pub fn set_log_enabled(&self, enabled: bool) {
        self.logger.set_enabled(enabled);
    }

    pub fn set_log_request_url_on_failure(&self, enabled: bool) {
        self.logger.set_log_request_url(enabled);
    }

    /// Replace the transport. `None` restores the default one.
    ///
    /// Requests issued before the call finish on the previous transport.
    pub fn install_transport(&self, transport: Option<Arc<dyn HttpTransport>>) -> Result<()> {
        let transport = match transport {
            Some(transport) => transport,
            None => default_transport(&self.config, &self.cookies)?,
        };
        self.swap_transport(transport);
        Ok(())
    }

    fn swap_transport(&self, transport: Arc<dyn HttpTransport>) {
        let dispatcher =
            Self::make_dispatcher(&self.config, &self.platform, &self.handle, &self.logger, transport);
        *self.dispatcher.write() = dispatcher;
        debug!("installed new HTTP transport");
    }

    pub fn all_cookies(&self) -> Vec<Cookie> {
        self.cookies.all()
    }

    pub fn clear_cookies(&self) {
        self.cookies.clear();
    }

    fn session(&self) -> SessionBootstrap {
        SessionBootstrap::new(
            self.config.session_gateway.clone(),
            Arc::clone(&self.executor),
            Arc::clone(&self.cookies),
            Arc::clone(&self.logger),
        )
    }

    /// Fetch the gateway with `token` to obtain session cookies.
    ///
    /// `on_complete` is posted to the main executor exactly once, whatever
    /// the outcome. With the default executor it runs on a worker thread;
    /// see [`with_main_executor`](Self::with_main_executor).
    pub fn initialize_session(
        &self,
        token: &str,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Option<RequestHandle> {
        let session = self.session();
        let url = session.gateway_url(token);
        self.start_session(&session, &url, on_complete)
    }

    /// Like [`initialize_session`](Self::initialize_session) with a full
    /// gateway URL.
    pub fn initialize_session_with_url(
        &self,
        url: &str,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Option<RequestHandle> {
        let session = self.session();
        self.start_session(&session, url, on_complete)
    }

    pub fn initialize_session_default(&self, on_complete: impl FnOnce() + Send + 'static) -> Option<RequestHandle> {
        self.initialize_session("", on_complete)
    }

    fn start_session(
        &self,
        session: &SessionBootstrap,
        url: &str,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Option<RequestHandle> {
        if self.ensure_running().is_err() {
            self.executor.post(Box::new(on_complete));
            return None;
        }
        session.start(url, &self.builder, &self.dispatcher(), on_complete)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Cancel everything in flight and refuse new requests. The worker pool
    /// itself is released when the fetcher is dropped.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_all();
        self.dispatcher().close();
        info!("resource fetcher shut down");
    }
}

impl Drop for ResourceFetcher {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(feature = "reqwest")]
fn default_transport(config: &FetchConfig, cookies: &Arc<CookieStore>) -> Result<Arc<dyn HttpTransport>> {
    let transport = crate::effects::ReqwestTransport::new(config, Arc::clone(cookies))?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport(_config: &FetchConfig, _cookies: &Arc<CookieStore>) -> Result<Arc<dyn HttpTransport>> {
    Ok(Arc::new(NoTransport))
}

/// Stand-in when built without a default transport: fails every request.
#[cfg(not(feature = "reqwest"))]
struct NoTransport;

#[cfg(not(feature = "reqwest"))]
#[async_trait::async_trait]
impl HttpTransport for NoTransport {
    async fn execute(
        &self,
        _request: &crate::core::OutboundRequest,
    ) -> std::result::Result<crate::effects::TransportResponse, crate::error::TransportError> {
        Err(crate::error::TransportError::new(
            crate::error::TransportErrorKind::Other,
            "no HTTP transport installed",
        ))
    }
}
