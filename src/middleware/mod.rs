//! # Middleware
//!
//! A [`MiddlewareFunc`] wraps the handler of one page node. Chains nest like
//! an onion: the first function of a chain is the outermost layer, so its
//! "before" logic runs first and its "after" logic runs last.
//!
//! At mount time each node's handler is wrapped, outermost first, in:
//!
//! 1. the implicit build-context layer installed by [`Pages`](crate::Pages),
//! 2. the global middlewares given to [`Pages::with_middlewares`](crate::Pages::with_middlewares),
//! 3. middlewares inherited from ancestor pages,
//! 4. the node's own middlewares.
//!
//! Hook-style middlewares implement [`Middleware`] and are turned into a
//! [`MiddlewareFunc`] with [`layer`].

mod core;
mod tracing;

pub use self::core::{compose, layer, middleware_fn, Middleware, MiddlewareFunc, StatusCapture};
pub use self::tracing::{tracing_middleware, TracingMiddleware};
