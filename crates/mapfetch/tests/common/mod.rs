//! Scripted transports shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mapfetch::platform::arch::Arch;
use mapfetch::platform::os::{Os, OsVersion};
use mapfetch::platform::Platform;
use mapfetch::{FetchConfig, HttpTransport, OutboundRequest, ResourceFetcher, TransportError, TransportResponse};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

type Script = dyn Fn(&OutboundRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Answers every request with the result of a closure and records what it
/// was asked for.
pub struct StubTransport {
    script: Box<Script>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    seen: Mutex<Vec<OutboundRequest>>,
}

impl StubTransport {
    pub fn new(script: impl Fn(&OutboundRequest) -> Result<TransportResponse, TransportError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            gate: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(body: &'static str) -> Self {
        Self::new(move |_| Ok(TransportResponse::new(200).with_reason("OK").with_body(body)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every transfer waits for a permit from `gate` before answering.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn seen(&self) -> Vec<OutboundRequest> {
        self.seen.lock().clone()
    }

    pub fn seen_urls(&self) -> Vec<String> {
        self.seen.lock().iter().map(|r| r.url().to_string()).collect()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn execute(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.seen.lock().push(request.clone());
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|_| TransportError::interrupted("gate closed"))?;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(request)
    }
}

/// Tracks how many transfers are active per host and the highest overlap
/// ever observed.
#[derive(Default)]
pub struct CountingTransport {
    active: Mutex<HashMap<String, usize>>,
    peak: Mutex<HashMap<String, usize>>,
    total_active: AtomicUsize,
    total_peak: AtomicUsize,
    delay: Duration,
}

impl CountingTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn peak(&self, host: &str) -> usize {
        self.peak.lock().get(host).copied().unwrap_or(0)
    }

    pub fn total_peak(&self) -> usize {
        self.total_peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for CountingTransport {
    async fn execute(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let host = request.host().to_string();
        {
            let mut active = self.active.lock();
            let count = active.entry(host.clone()).or_default();
            *count += 1;
            let mut peak = self.peak.lock();
            let best = peak.entry(host.clone()).or_default();
            *best = (*best).max(*count);
        }
        let total = self.total_active.fetch_add(1, Ordering::SeqCst) + 1;
        self.total_peak.fetch_max(total, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.total_active.fetch_sub(1, Ordering::SeqCst);
        *self.active.lock().entry(host).or_default() -= 1;
        Ok(TransportResponse::new(200).with_body("tile"))
    }
}

pub fn linux() -> Platform {
    Platform::new(Os::Linux, OsVersion::parse("6.8").unwrap(), Arch::X86_64)
}

pub fn legacy_android() -> Platform {
    Platform::new(Os::Android, OsVersion::parse("4.4").unwrap(), Arch::ARM)
}

/// A fetcher on the current test runtime using `transport`.
pub fn fetcher_with(config: FetchConfig, transport: Arc<dyn HttpTransport>) -> ResourceFetcher {
    ResourceFetcher::with_handle(config, Handle::current())
        .unwrap()
        .on_platform(linux())
        .with_transport(transport)
}
