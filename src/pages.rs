//! Mounting a page tree onto a router.

use std::fmt;
use std::iter;
use std::sync::Arc;

use http::HeaderValue;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatcher::{
    build_handler, default_error_handler, page_receiver, ErrorHandler, HandlerOptions,
    PageConfigFn,
};
use crate::error::{Error, Result};
use crate::invoke::Invocation;
use crate::middleware::{compose, middleware_fn, MiddlewareFunc};
use crate::page::{Page, PageNode, PageTree, TreeBuilder};
use crate::registry::TypeRegistry;
use crate::router::{PathParams, Router};
use crate::server::{handler_fn, BufferPool, Handler, Request, ResponseWriter};
use crate::url_for::{UrlArg, UrlParams, UrlPattern};

/// Everything a mount produced: the page tree and the registry its methods
/// draw dependencies from. Every request served by the mount carries it in
/// its extensions.
pub struct BuildContext {
    tree: PageTree,
    registry: TypeRegistry,
}

impl BuildContext {
    #[must_use]
    pub fn tree(&self) -> &PageTree {
        &self.tree
    }

    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Reverse URL lookup outside of a request.
    pub fn url_for(&self, target: impl Into<UrlPattern>, args: &[UrlArg]) -> Result<String> {
        self.tree.url_for(None, &target.into(), args)
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

/// Mounts page trees onto a [`Router`].
///
/// ```rust,ignore
/// let pages = Pages::new()
///     .with_default_page_config(htmx_page_config)
///     .with_middlewares([tracing_middleware()]);
/// let mut mux = ServeMux::new();
/// pages.mount(&mut mux, Site::default(), "/", registry)?;
/// ```
pub struct Pages {
    on_error: ErrorHandler,
    middlewares: Vec<MiddlewareFunc>,
    default_page_config: Option<PageConfigFn>,
    config: Config,
    pool: Arc<BufferPool>,
}

impl Default for Pages {
    fn default() -> Self {
        Self {
            on_error: default_error_handler(),
            middlewares: Vec::new(),
            default_page_config: None,
            config: Config::default(),
            pool: BufferPool::global(),
        }
    }
}

impl Pages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the callback that answers request-time failures.
    #[must_use]
    pub fn with_error_handler<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&mut dyn ResponseWriter, &Request, &Error) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(on_error);
        self
    }

    /// Middlewares wrapped around every page, outside the pages' own.
    #[must_use]
    pub fn with_middlewares(mut self, middlewares: impl IntoIterator<Item = MiddlewareFunc>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    /// Selector used by pages without their own `page_config`.
    #[must_use]
    pub fn with_default_page_config<F>(mut self, config: F) -> Self
    where
        F: Fn(&Request) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.default_page_config = Some(Arc::new(config));
        self
    }

    /// Use `config`, with a buffer pool of its own.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.pool = Arc::new(BufferPool::from_config(&config));
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the tree rooted at `page` and register its handlers on `router`.
    ///
    /// `route_meta` is the root's route metadata (see
    /// [`RouteSpec`](crate::RouteSpec)). Every handler is built before the
    /// router is touched, and the registrations are applied through
    /// [`Router::atomic`]: a failed mount leaves the router as it was.
    pub fn mount<P: Page>(
        &self,
        router: &mut dyn Router,
        page: P,
        route_meta: &str,
        registry: TypeRegistry,
    ) -> Result<Arc<BuildContext>> {
        let tree = TreeBuilder::build(&registry, page, route_meta)?;
        let ctx = Arc::new(BuildContext { tree, registry });
        let opts = Arc::new(HandlerOptions {
            on_error: Arc::clone(&self.on_error),
            default_page_config: self.default_page_config.clone(),
            pool: Arc::clone(&self.pool),
            content_type: HeaderValue::from_str(&self.config.content_type).map_err(|e| {
                Error::Config(format!("content_type {:?}: {}", self.config.content_type, e))
            })?,
        });
        let mount = Mount {
            pages: self,
            ctx: &ctx,
            opts: &opts,
            context: context_middleware(&ctx),
        };
        let mut planned = Vec::new();
        mount.plan(ctx.tree().root(), &[], &mut planned)?;
        router.atomic(&mut |r| apply(r, &planned))?;
        info!(
            root = %ctx.tree().root().name(),
            pages = ctx.tree().len(),
            "page tree mounted"
        );
        Ok(ctx)
    }
}

struct Mount<'m> {
    pages: &'m Pages,
    ctx: &'m Arc<BuildContext>,
    opts: &'m Arc<HandlerOptions>,
    context: MiddlewareFunc,
}

/// A registration computed ahead of touching the router.
enum Planned {
    Group {
        path: String,
        entries: Vec<Planned>,
    },
    Route {
        page: String,
        method: String,
        route: String,
        handler: Handler,
    },
}

fn apply(router: &mut dyn Router, entries: &[Planned]) -> Result<()> {
    for entry in entries {
        match entry {
            Planned::Group { path, entries } => {
                router.route(path, &mut |sub| apply(sub, entries))?;
            }
            Planned::Route {
                page,
                method,
                route,
                handler,
            } => router
                .handle_method(method, route, Arc::clone(handler))
                .map_err(|e| Error::at_node(page, e))?,
        }
    }
    Ok(())
}

impl Mount<'_> {
    /// Append the registrations for `node` and its subtree to `out`,
    /// children first.
    fn plan(
        &self,
        node: &Arc<PageNode>,
        inherited: &[MiddlewareFunc],
        out: &mut Vec<Planned>,
    ) -> Result<()> {
        if node.route().trim().is_empty() {
            return Err(Error::at_node(
                node.name(),
                Error::Config("page route is empty".to_string()),
            ));
        }
        let mut chain = inherited.to_vec();
        if node.middlewares.is_some() {
            chain.extend(self.node_middlewares(node)?);
        }

        if !node.children().is_empty() {
            let mut entries = Vec::new();
            for &id in node.children() {
                let child = self.ctx.tree().node(id).ok_or_else(|| {
                    Error::Config(format!("page {} lost child {}", node.name(), id))
                })?;
                self.plan(child, &chain, &mut entries)?;
            }
            out.push(Planned::Group {
                path: node.route().to_string(),
                entries,
            });
        }

        if node.has_handler() && !node.components.is_empty() {
            warn!(
                page = %node.name(),
                "page declares both a handler and components; components are ignored"
            );
        }
        let Some(handler) = build_handler(self.ctx, node, self.opts) else {
            if node.children().is_empty() {
                return Err(Error::at_node(
                    node.name(),
                    Error::Config(
                        "page has no handler, components or child pages".to_string(),
                    ),
                ));
            }
            return Ok(());
        };
        let layers = iter::once(&self.context)
            .chain(&self.pages.middlewares)
            .chain(&chain)
            .collect::<Vec<_>>();
        let handler = compose(handler, node, layers);

        if self.pages.config.log_routes {
            info!(
                page = %node.name(),
                method = %node.method(),
                route = %node.full_route(),
                title = %node.title(),
                "registering page"
            );
        } else {
            debug!(
                page = %node.name(),
                method = %node.method(),
                route = %node.full_route(),
                "registering page"
            );
        }
        out.push(Planned::Route {
            page: node.name().to_string(),
            method: node.method().to_string(),
            route: node.route().to_string(),
            handler,
        });
        Ok(())
    }

    fn node_middlewares(&self, node: &Arc<PageNode>) -> Result<Vec<MiddlewareFunc>> {
        let Some(provider) = &node.middlewares else {
            return Ok(Vec::new());
        };
        let ctx: &BuildContext = self.ctx;
        let mut inv = Invocation::new(
            format!("{}.Middlewares", node.name()),
            page_receiver(ctx, node)?,
            ctx.registry(),
        )
        .with_node(node);
        let values = provider
            .call(&mut inv)
            .and_then(|returned| {
                returned.strip_error().map_err(|cause| {
                    Error::call(
                        format!("error calling Middlewares method on {}", node.name()),
                        cause,
                    )
                })
            })
            .map_err(|e| Error::at_node(node.name(), e))?;

        let mut values = values.into_iter();
        match (values.next(), values.next()) {
            (Some(value), None) => value.downcast::<Vec<MiddlewareFunc>>().map_err(|value| {
                Error::at_node(
                    node.name(),
                    Error::InvalidCapability(format!(
                        "Middlewares method on {} must return Vec<MiddlewareFunc>, got {}",
                        node.name(),
                        value.type_name()
                    )),
                )
            }),
            _ => Err(Error::at_node(
                node.name(),
                Error::InvalidCapability(format!(
                    "Middlewares method on {} must return exactly one list",
                    node.name()
                )),
            )),
        }
    }
}

/// The outermost layer of every page: puts the build context and the
/// matched path parameters into the request's extensions.
fn context_middleware(ctx: &Arc<BuildContext>) -> MiddlewareFunc {
    let ctx = Arc::clone(ctx);
    middleware_fn(move |next, _node| {
        let ctx = Arc::clone(&ctx);
        handler_fn(move |w, req| {
            req.extensions_mut().insert(Arc::clone(&ctx));
            let params = req.extensions().get::<PathParams>().map(|params| {
                params
                    .iter()
                    .filter(|(_, v)| !v.is_empty())
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<UrlParams>()
            });
            if let Some(params) = params.filter(|p| !p.is_empty()) {
                req.extensions_mut().insert(params);
            }
            next(w, req);
        })
    })
}
