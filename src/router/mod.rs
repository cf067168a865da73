//! # Router Module
//!
//! The page layer never matches requests itself. It drives a [`Router`]:
//! nested route groups and `(method, pattern, handler)` registrations,
//! applied all-or-nothing through [`Router::atomic`].
//! Any multiplexer can sit behind the trait; two implementations ship here:
//!
//! - [`ServeMux`]: a radix-tree multiplexer with `{name}`, `{name...}` and
//!   `{$}` patterns that records matched values as [`PathParams`]
//! - [`PrintRouter`]: records and logs registrations without serving
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut mux = ServeMux::new();
//! mux.route("/api", &mut |r| {
//!     r.handle_method("GET", "/users/{id}", handler_fn(|w, _req| {
//!         let _ = w.write_body(b"user");
//!     }))
//! })?;
//! mux.serve(&mut recorder, &mut request);
//! ```

mod mux;
mod print;

use std::sync::Arc;

use smallvec::SmallVec;

pub use self::mux::{Lookup, ServeMux};
pub use self::print::{PrintRouter, Registration};
use crate::error::Result;
use crate::server::Handler;

/// Parameters most routes stay under before spilling to the heap.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Matched path parameter values, in pattern order.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// The values a multiplexer matched for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub ParamVec);

impl PathParams {
    /// Last write wins when a name repeats at different depths.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Registration surface of an HTTP multiplexer.
pub trait Router {
    /// Run `group` against a router whose patterns are prefixed with `path`.
    fn route(
        &mut self,
        path: &str,
        group: &mut dyn FnMut(&mut dyn Router) -> Result<()>,
    ) -> Result<()>;

    /// Register `handler` for `method` (or `ANY`) at `path`.
    fn handle_method(&mut self, method: &str, path: &str, handler: Handler) -> Result<()>;

    /// Run `batch` all-or-nothing: when it fails, none of the registrations
    /// it made remain on the router.
    fn atomic(&mut self, batch: &mut dyn FnMut(&mut dyn Router) -> Result<()>) -> Result<()>;
}
