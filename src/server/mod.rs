//! # Server Module
//!
//! The request/response surface handlers are compiled against. Transport is
//! out of scope: requests arrive as [`Request`] values and responses are
//! written through the [`ResponseWriter`] trait, so any HTTP stack can adapt
//! to them.
//!
//! - [`ResponseRecorder`] captures a response in memory (tests, adapters).
//! - [`BufferPool`] and [`BufferedWriter`] implement discard-on-failure output.
//! - [`http_error`] writes a plain-text error response.

mod buffer;
mod response;

use std::sync::Arc;

pub use buffer::{BufferPool, BufferedWriter, PooledBuffer};
pub use response::{http_error, ResponseRecorder, ResponseWriter};

/// The request type handlers receive. Per-request ambient state (path
/// parameters, the build context) travels in its extensions.
pub type Request = http::Request<Vec<u8>>;

/// A compiled request handler.
pub type Handler = Arc<dyn Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Handler
where
    F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a body-less request for `method` and `uri`.
///
/// Returns `None` when `method` or `uri` do not parse.
pub fn request(method: &str, uri: &str) -> Option<Request> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Vec::new())
        .ok()
}
