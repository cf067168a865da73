use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, StatusCode};

use crate::page::PageNode;
use crate::server::{handler_fn, http_error, Handler, Request, ResponseWriter};

/// Wraps `next`, the handler of `node`, into a new handler.
pub type MiddlewareFunc = Arc<dyn Fn(Handler, &Arc<PageNode>) -> Handler + Send + Sync>;

pub fn middleware_fn<F>(f: F) -> MiddlewareFunc
where
    F: Fn(Handler, &Arc<PageNode>) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `handler` in `chain`, the first element ending up outermost.
pub fn compose<'a, I>(handler: Handler, node: &Arc<PageNode>, chain: I) -> Handler
where
    I: IntoIterator<Item = &'a MiddlewareFunc>,
    I::IntoIter: DoubleEndedIterator,
{
    chain
        .into_iter()
        .rev()
        .fold(handler, |next, middleware| middleware(next, node))
}

/// Before/after hooks around a page handler.
pub trait Middleware: Send + Sync {
    /// Returning a status short-circuits the request with a plain error
    /// response; the handler and `after` are skipped.
    fn before(&self, _req: &mut Request, _node: &PageNode) -> Option<StatusCode> {
        None
    }

    fn after(&self, _req: &Request, _node: &PageNode, _status: StatusCode, _latency: Duration) {}
}

/// Adapt a [`Middleware`] into a [`MiddlewareFunc`].
pub fn layer<M: Middleware + 'static>(middleware: M) -> MiddlewareFunc {
    let middleware = Arc::new(middleware);
    middleware_fn(move |next, node| {
        let middleware = Arc::clone(&middleware);
        let node = Arc::clone(node);
        handler_fn(move |w, req| {
            if let Some(status) = middleware.before(req, &node) {
                http_error(w, status.canonical_reason().unwrap_or("error"), status);
                return;
            }
            let start = Instant::now();
            let mut capture = StatusCapture::new(w);
            next(&mut capture, req);
            let status = capture.status();
            middleware.after(req, &node, status, start.elapsed());
        })
    })
}

/// Pass-through writer that remembers the response status.
pub struct StatusCapture<'w> {
    inner: &'w mut dyn ResponseWriter,
    status: Option<StatusCode>,
}

impl<'w> StatusCapture<'w> {
    pub fn new(inner: &'w mut dyn ResponseWriter) -> Self {
        Self {
            inner,
            status: None,
        }
    }

    /// `200 OK` if nothing was written yet.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}

impl ResponseWriter for StatusCapture<'_> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
        self.inner.write_header(status);
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.status.get_or_insert(StatusCode::OK);
        self.inner.write_body(bytes)
    }
}
