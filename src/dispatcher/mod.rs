//! # Dispatcher Module
//!
//! Compiles a page node into a request [`Handler`](crate::Handler).
//!
//! ## Handler kinds
//!
//! - **Full handler**: the page declared a `handler` taking the response
//!   writer and request. Handlers without injected parameters that cannot
//!   fail are called directly. All others write into a [`BufferedWriter`]
//!   that is committed only when the call succeeds.
//! - **Component page**: each request picks a component, resolves its props,
//!   invokes it and renders it into a pooled buffer. Bytes reach the client
//!   only after rendering succeeded.
//! - **Routing group**: no handler and no components. Nothing is registered
//!   for the node itself.
//!
//! ## Component selection
//!
//! 1. The node's own `page_config` selector, called with the request.
//! 2. The default selector given to
//!    [`Pages::with_default_page_config`](crate::Pages::with_default_page_config).
//! 3. The component named `Page`.
//!
//! A selector naming a component the node does not have is an error.
//!
//! ## Error Handling
//!
//! Every request-time failure goes to the [`ErrorHandler`]. The default one
//! logs the error and answers `500 Internal Server Error`.
//!
//! [`BufferedWriter`]: crate::server::BufferedWriter

mod core;

use std::sync::Arc;

use http::StatusCode;
use tracing::error;

pub(crate) use self::core::{build_handler, page_receiver, HandlerOptions};
use crate::error::Error;
use crate::server::{http_error, Request, ResponseWriter};

/// Receives every request-time failure and owns the response written for it.
pub type ErrorHandler = Arc<dyn Fn(&mut dyn ResponseWriter, &Request, &Error) + Send + Sync>;

/// Per-request component selector returning a component name.
pub type PageConfigFn = Arc<dyn Fn(&Request) -> anyhow::Result<String> + Send + Sync>;

/// Log the error and answer `500 Internal Server Error`.
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|w: &mut dyn ResponseWriter, req: &Request, err: &Error| {
        error!(
            method = %req.method(),
            path = %req.uri().path(),
            error = %err,
            "request failed"
        );
        http_error(w, "Internal Server Error", StatusCode::INTERNAL_SERVER_ERROR);
    })
}
