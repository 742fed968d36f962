//! Effects layer: everything that touches the network, shared state or
//! other threads.

pub mod cookie_store;
pub mod dispatcher;
pub mod handle;
pub mod main_loop;
pub mod responder;
pub mod response;
pub mod session;
pub mod transport;

pub use cookie_store::CookieStore;
pub use dispatcher::Dispatcher;
pub use handle::{HandleState, RequestHandle};
pub use main_loop::{InlineExecutor, MainExecutor, MainLoop};
pub use responder::{FnResponder, Responder};
pub use session::SessionBootstrap;
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{HttpTransport, TransportResponse};
