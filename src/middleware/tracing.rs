use std::time::Duration;

use http::StatusCode;
use tracing::{debug, info, info_span};

use super::core::{layer, middleware_fn, Middleware, MiddlewareFunc};
use crate::page::PageNode;
use crate::server::{handler_fn, Request};

/// Logs each request with its page, status and latency.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &mut Request, node: &PageNode) -> Option<StatusCode> {
        debug!(
            method = %req.method(),
            path = %req.uri().path(),
            page = %node.name(),
            "request started"
        );
        None
    }

    fn after(&self, req: &Request, node: &PageNode, status: StatusCode, latency: Duration) {
        info!(
            method = %req.method(),
            path = %req.uri().path(),
            page = %node.name(),
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "request completed"
        );
    }
}

/// [`TracingMiddleware`] running inside a `request` span.
pub fn tracing_middleware() -> MiddlewareFunc {
    let logged = layer(TracingMiddleware);
    middleware_fn(move |next, node| {
        let handler = logged(next, node);
        let page = node.name().to_string();
        handler_fn(move |w, req| {
            let span = info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                page = %page
            );
            span.in_scope(|| handler(w, req));
        })
    })
}
