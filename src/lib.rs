//! # pagetree
//!
//! **pagetree** compiles a nested description of a web application's pages
//! into request handlers. Pages are plain structs. Their fields declare child
//! pages with route metadata, and their methods provide the renderable
//! components, props resolvers, middlewares and hooks of each page.
//!
//! ## Overview
//!
//! Mounting a root page:
//!
//! 1. builds a [`PageTree`]: every child field becomes a node with its own
//!    page instance, and every node's `init` hook runs once,
//! 2. compiles each node into a [`Handler`] that selects a component,
//!    resolves its props, renders it into a pooled buffer and writes it only
//!    on success,
//! 3. wraps the handler in the global, inherited and local middlewares,
//! 4. registers it on a [`Router`], nesting children under their parent's
//!    route.
//!
//! Method parameters that are neither the request nor explicit props are
//! injected by type from the current node or a [`TypeRegistry`].
//!
//! ## Architecture
//!
//! - **[`page`]** - the [`Page`] trait, route metadata and the page tree
//! - **[`invoke`]** - type-erased capability methods and parameter injection
//! - **[`registry`]** - values available for injection
//! - **[`dispatcher`]** - compiles page nodes into handlers
//! - **[`middleware`]** - onion-style handler wrappers
//! - **[`router`]** - the router trait, a radix-tree mux and a printing router
//! - **[`url_for`]** - reverse URL lookup and path templates
//! - **[`server`]** - request/response types and render buffers
//! - **[`htmx`]** - `HX-Target` driven component selection
//! - **[`config`]** / **[`logging`]** - runtime configuration and tracing setup
//!
//! ## Example
//!
//! ```rust
//! use pagetree::{Page, Pages, Props, ServeMux, TypeRegistry};
//!
//! #[derive(Default, Page)]
//! #[page(component(Page = page), props(Props = props))]
//! struct Post;
//!
//! impl Post {
//!     fn props(&self, req: &pagetree::Request) -> String {
//!         req.uri().path().to_string()
//!     }
//!
//!     fn page(&self, path: Props<String>) -> String {
//!         format!("<h1>{}</h1>", *path)
//!     }
//! }
//!
//! #[derive(Default, Page)]
//! struct Site {
//!     #[route("GET /posts/{id} Post")]
//!     post: Post,
//! }
//!
//! let mut mux = ServeMux::new();
//! Pages::new().mount(&mut mux, Site::default(), "/", TypeRegistry::new())?;
//!
//! let mut rec = pagetree::ResponseRecorder::new();
//! let mut req = pagetree::server::request("GET", "/posts/7").unwrap();
//! mux.serve(&mut rec, &mut req);
//! assert_eq!(rec.body_string(), "<h1>/posts/7</h1>");
//! # Ok::<(), pagetree::Error>(())
//! ```

extern crate self as pagetree;

pub mod component;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod htmx;
pub mod invoke;
pub mod logging;
pub mod middleware;
pub mod page;
mod pages;
pub mod registry;
pub mod router;
pub mod server;
pub mod url_for;

pub use component::{render_fn, Component, IntoComponent, RenderFn};
pub use config::Config;
pub use dispatcher::{default_error_handler, ErrorHandler, PageConfigFn};
pub use error::{Error, Result};
pub use htmx::{htmx_page_config, is_htmx, mixed_case};
pub use invoke::{Arg, Dep, IntoOutput, MethodRef, Props, Returned};
pub use middleware::{
    compose, layer, middleware_fn, tracing_middleware, Middleware, MiddlewareFunc,
    TracingMiddleware,
};
pub use page::{join_path, Descriptor, NodeId, Page, PageNode, PageTree, RouteSpec, METHOD_ANY};
pub use pages::{BuildContext, Pages};
pub use registry::{Provides, TypeRegistry};
pub use router::{PathParams, PrintRouter, Router, ServeMux};
pub use server::{handler_fn, Handler, Request, ResponseRecorder, ResponseWriter};
pub use url_for::{url_for, UrlArg, UrlParams, UrlPart, UrlPattern};

#[cfg(feature = "derive")]
pub use pagetree_macros::Page;
