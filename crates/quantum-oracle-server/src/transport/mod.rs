//! Transport layer for serving the oracle over HTTP.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpTransport;
