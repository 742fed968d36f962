//! Core layer: pure transformations from caller input to outbound requests
//! and from transport results to classified outcomes.

pub mod builder;
pub mod classify;
pub mod identity;
pub mod resource_url;

pub use self::builder::{OutboundRequest, RequestBuilder};
pub use self::classify::{classify_error, classify_kind, response_metadata};
pub use self::identity::{UserAgent, to_human_readable_ascii};
pub use self::resource_url::UrlPolicy;
