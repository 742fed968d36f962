//! Session bootstrap and cookie jar behaviour through the fetcher.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mapfetch::{Cookie, FetchConfig, MainLoop, ResourceFetcher, TransportError, TransportResponse};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use url::Url;

use common::{StubTransport, fetcher_with};

const WAIT: Duration = Duration::from_secs(5);
const GATEWAY: &str = "https://gateway.example/20250110/1/1/3.mvt?token=";

fn session_fetcher(stub: Arc<StubTransport>) -> (ResourceFetcher, Arc<MainLoop>) {
    let main = Arc::new(MainLoop::new());
    let fetcher = fetcher_with(FetchConfig::default().session_gateway(GATEWAY), stub).with_main_executor(main.clone());
    (fetcher, main)
}

fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let hits = Arc::new(AtomicUsize::new(0));
    let inner = hits.clone();
    (hits, move || {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

async fn settle(main: &MainLoop) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    main.run_pending();
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_bootstrap_stores_cookies_and_completes_once() {
    let main = Arc::new(MainLoop::new());
    let fetcher = ResourceFetcher::with_handle(FetchConfig::default().session_gateway(GATEWAY), tokio::runtime::Handle::current())
        .unwrap()
        .on_platform(common::linux())
        .with_main_executor(main.clone());

    let jar = fetcher.cookie_store().clone();
    let stub = Arc::new(StubTransport::new(move |req| {
        let cookie = Cookie::parse("session=s3cr3t; Path=/; Secure; HttpOnly", req.url()).unwrap();
        jar.save(req.url(), [cookie]);
        Ok(TransportResponse::new(200).with_body("pbf"))
    }));
    fetcher.install_transport(Some(stub.clone())).unwrap();

    let (hits, on_complete) = counter();
    assert!(fetcher.initialize_session("tok123", on_complete).is_some());
    timeout(WAIT, main.run_next()).await.unwrap();
    settle(&main).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let sent = stub.seen();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].url().as_str(), format!("{GATEWAY}tok123"));
    assert_eq!(sent[0].headers().len(), 1);
    assert!(sent[0].header("User-Agent").is_some());

    let tile = Url::parse("https://gateway.example/tiles/1.pbf").unwrap();
    let names: Vec<_> = fetcher.cookie_store().load(&tile).into_iter().map(|c| c.name).collect();
    assert_eq!(names, ["session"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_bootstrap_still_completes_once() {
    let stub = Arc::new(StubTransport::new(|req| Err(TransportError::unknown_host(req.host()))));
    let (fetcher, main) = session_fetcher(stub);

    let (hits, on_complete) = counter();
    fetcher.initialize_session("tok", on_complete);
    timeout(WAIT, main.run_next()).await.unwrap();
    settle(&main).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_completes_once() {
    let stub = Arc::new(StubTransport::new(|_| {
        Ok(TransportResponse::new(401).with_reason("Unauthorized"))
    }));
    let (fetcher, main) = session_fetcher(stub);

    let (hits, on_complete) = counter();
    fetcher.initialize_session("bad-token", on_complete);
    timeout(WAIT, main.run_next()).await.unwrap();
    settle(&main).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unusable_url_completes_immediately() {
    let stub = Arc::new(StubTransport::ok(""));
    let (fetcher, main) = session_fetcher(stub.clone());

    let (hits, on_complete) = counter();
    assert!(fetcher.initialize_session_with_url("gateway without scheme", on_complete).is_none());
    assert_eq!(main.run_pending(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(stub.seen().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn default_session_uses_empty_token() {
    let stub = Arc::new(StubTransport::ok(""));
    let (fetcher, main) = session_fetcher(stub.clone());

    let (hits, on_complete) = counter();
    fetcher.initialize_session_default(on_complete);
    timeout(WAIT, main.run_next()).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(stub.seen_urls(), vec![GATEWAY.to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_bootstrap_still_completes_once() {
    let gate = Arc::new(Semaphore::new(0));
    let stub = Arc::new(StubTransport::ok("").gated(gate));
    let (fetcher, main) = session_fetcher(stub);

    let (hits, on_complete) = counter();
    let handle = fetcher.initialize_session("tok", on_complete).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.cancel());
    timeout(WAIT, main.run_next()).await.unwrap();
    settle(&main).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn fetcher_exposes_and_clears_cookies() {
    let (fetcher, _main) = session_fetcher(Arc::new(StubTransport::ok("")));
    let gateway = Url::parse("https://gateway.example/").unwrap();
    fetcher.cookie_store().save(
        &gateway,
        [
            Cookie::new("session", "1", "gateway.example"),
            Cookie::new("region", "eu", "example").include_subdomains(),
        ],
    );

    assert_eq!(fetcher.all_cookies().len(), 2);
    let other = Url::parse("https://cdn.other.test/").unwrap();
    assert!(fetcher.cookie_store().load(&other).is_empty());

    fetcher.clear_cookies();
    assert!(fetcher.all_cookies().is_empty());
    assert!(fetcher.cookie_store().load(&gateway).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn default_executor_completes_on_a_worker() {
    let fetcher = fetcher_with(FetchConfig::default().session_gateway(GATEWAY), Arc::new(StubTransport::ok("")));
    let caller_thread = std::thread::current().id();
    let (tx, rx) = tokio::sync::oneshot::channel();

    fetcher.initialize_session("tok", move || {
        let _ = tx.send(std::thread::current().id());
    });
    let completed_on = timeout(WAIT, rx).await.unwrap().unwrap();
    assert_ne!(completed_on, caller_thread);
}
