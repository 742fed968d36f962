//! Asynchronous resource fetching for native map renderers.
//!
//! A renderer hands [`FetchRequest`]s for tiles, styles and glyphs to a
//! [`ResourceFetcher`]. The fetcher builds the HTTP request, runs it under a
//! global and a per-host concurrency cap, and reports exactly one
//! [`ClassifiedOutcome`] per request unless the request is cancelled first.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable requests, outcomes, cookies and configuration
//! - [`core`] - Pure transformations: identity header, URL rewriting,
//!   request building, failure classification
//! - [`effects`] - Transport, cookie store, dispatcher, request handles and
//!   session bootstrap
//!
//! # Key Features
//!
//! - **Bounded**: at most 64 active transfers overall and 20 per host
//!   (10 on legacy platforms)
//! - **Cancellable**: cancelling before dispatch means no network I/O and no
//!   callback
//! - **Classified failures**: connection, temporary or permanent; retry policy
//!   stays with the caller
//! - **Pluggable transport**: `reqwest` by default, any [`HttpTransport`] in
//!   tests

pub mod core;
pub mod data;
pub mod effects;
mod error;
mod fetcher;
pub mod logging;

pub use crate::core::{OutboundRequest, RequestBuilder, UrlPolicy, UserAgent};
pub use data::{CallerHandle, ClassifiedOutcome, Cookie, FailureKind, FetchConfig, FetchRequest, FetchResponse};
pub use effects::{
    CookieStore, Dispatcher, FnResponder, HandleState, HttpTransport, InlineExecutor, MainExecutor, MainLoop,
    RequestHandle, Responder, SessionBootstrap, TransportResponse,
};
#[cfg(feature = "reqwest")]
pub use effects::ReqwestTransport;
pub use error::{Error, Result, TransportError, TransportErrorKind};
pub use fetcher::ResourceFetcher;
pub use logging::{HttpLogger, init_tracing};

pub use mapfetch_platform as platform;
