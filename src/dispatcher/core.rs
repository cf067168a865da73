use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::HeaderValue;
use tracing::{debug, warn};

use super::{ErrorHandler, PageConfigFn};
use crate::component::Component;
use crate::error::{Error, Result};
use crate::invoke::{Arg, Invocation, MethodRef, Receiver};
use crate::page::PageNode;
use crate::pages::BuildContext;
use crate::server::{handler_fn, BufferPool, BufferedWriter, Handler, Request, ResponseWriter};

/// Request-time settings shared by every compiled handler of one mount.
pub(crate) struct HandlerOptions {
    pub(crate) on_error: ErrorHandler,
    pub(crate) default_page_config: Option<PageConfigFn>,
    pub(crate) pool: Arc<BufferPool>,
    pub(crate) content_type: HeaderValue,
}

/// The page instance of `node`, borrowed for a shared call.
pub(crate) fn page_receiver<'a>(ctx: &'a BuildContext, node: &PageNode) -> Result<Receiver<'a>> {
    let value = ctx.tree().value(node.id()).ok_or_else(|| {
        Error::Config(format!("page {} has no instance in the tree", node.name()))
    })?;
    Ok(Receiver::Shared {
        value,
        type_name: node.type_name(),
    })
}

/// Compile `node` into a handler, or `None` for a pure routing group.
pub(crate) fn build_handler(
    ctx: &Arc<BuildContext>,
    node: &Arc<PageNode>,
    opts: &Arc<HandlerOptions>,
) -> Option<Handler> {
    let ctx = Arc::clone(ctx);
    let node = Arc::clone(node);
    let opts = Arc::clone(opts);

    if let Some(method) = node.handler.clone() {
        let signature = method.signature();
        let direct = signature.params.is_empty() && !signature.fallible;
        return Some(handler_fn(move |w, req| {
            serve_full(&ctx, &node, &method, &opts, direct, w, req);
        }));
    }
    if node.components.is_empty() {
        return None;
    }
    Some(handler_fn(move |w, req| {
        if let Err(err) = serve_component(&ctx, &node, &opts, w, req) {
            (opts.on_error)(w, req, &err);
        }
    }))
}

fn serve_full(
    ctx: &BuildContext,
    node: &Arc<PageNode>,
    method: &MethodRef,
    opts: &HandlerOptions,
    direct: bool,
    w: &mut dyn ResponseWriter,
    req: &mut Request,
) {
    let req: &Request = req;
    let qualified = format!("{}.ServeHTTP", node.name());
    let receiver = match page_receiver(ctx, node) {
        Ok(receiver) => receiver,
        Err(err) => return (opts.on_error)(w, req, &err),
    };

    if direct {
        let outcome = {
            let mut inv = Invocation::new(qualified, receiver, ctx.registry())
                .with_node(node)
                .with_request(req)
                .with_writer(w);
            method.call(&mut inv).map(drop)
        };
        if let Err(err) = outcome {
            (opts.on_error)(w, req, &err);
        }
        return;
    }

    let mut buffered = BufferedWriter::new(w, &opts.pool);
    let outcome = {
        let mut inv = Invocation::new(qualified, receiver, ctx.registry())
            .with_node(node)
            .with_request(req)
            .with_writer(&mut buffered);
        method.call(&mut inv).and_then(|returned| {
            returned.strip_error().map(drop).map_err(Error::Handler)
        })
    };
    match outcome {
        Ok(()) => {
            if let Err(err) = buffered.commit() {
                warn!(page = %node.name(), error = %err, "failed to flush response");
            }
        }
        Err(err) => {
            drop(buffered);
            let err = match err {
                Error::Handler(cause) => Error::call(
                    format!("error calling ServeHTTP method for {}", node.name()),
                    cause,
                ),
                other => other,
            };
            (opts.on_error)(w, req, &err);
        }
    }
}

fn serve_component(
    ctx: &BuildContext,
    node: &Arc<PageNode>,
    opts: &HandlerOptions,
    w: &mut dyn ResponseWriter,
    req: &Request,
) -> Result<()> {
    let name = find_component(ctx, node, opts, req)?;
    debug!(page = %node.name(), component = %name, "component selected");
    let method = node.component(&name).ok_or_else(|| {
        Error::InvalidCapability(format!("page {} has no component {}", node.name(), name))
    })?;
    let props = get_props(ctx, node, &name, req)?;

    let mut inv = Invocation::new(
        format!("{}.{}", node.name(), name),
        page_receiver(ctx, node)?,
        ctx.registry(),
    )
    .with_node(node)
    .with_request(req)
    .with_args(props);
    let values = method.call(&mut inv)?.strip_error().map_err(|cause| {
        Error::call(
            format!("error calling component {}.{}", node.name(), name),
            cause,
        )
    })?;
    let component = values
        .into_iter()
        .next()
        .and_then(|arg| arg.downcast::<Box<dyn Component>>().ok())
        .ok_or_else(|| {
            Error::InvalidCapability(format!(
                "{}.{} did not return a component",
                node.name(),
                name
            ))
        })?;

    let mut buf = opts.pool.get();
    component.render(req, &mut *buf).map_err(Error::Render)?;

    if !w.headers().contains_key(CONTENT_TYPE) {
        w.headers_mut().insert(CONTENT_TYPE, opts.content_type.clone());
    }
    if let Err(err) = w.write_body(&buf) {
        warn!(page = %node.name(), error = %err, "failed to write rendered page");
    }
    Ok(())
}

/// Name of the component to render for `req`.
fn find_component(
    ctx: &BuildContext,
    node: &Arc<PageNode>,
    opts: &HandlerOptions,
    req: &Request,
) -> Result<String> {
    if let Some(config) = &node.page_config {
        let mut inv = Invocation::new(
            format!("{}.PageConfig", node.name()),
            page_receiver(ctx, node)?,
            ctx.registry(),
        )
        .with_node(node)
        .with_request(req);
        let values = config.call(&mut inv)?.strip_error().map_err(|cause| {
            Error::call(
                format!("error calling PageConfig method for {}", node.name()),
                cause,
            )
        })?;
        let name = component_name(values).ok_or_else(|| {
            Error::InvalidCapability(format!(
                "PageConfig method for {} must return a component name",
                node.name()
            ))
        })?;
        if node.component(&name).is_none() {
            return Err(Error::InvalidCapability(format!(
                "PageConfig method for {} returned unknown component name: {}",
                node.name(),
                name
            )));
        }
        return Ok(name);
    }

    if let Some(config) = &opts.default_page_config {
        let name = config(req).map_err(|cause| {
            Error::call(
                format!("error calling default PageConfig for {}", node.name()),
                cause,
            )
        })?;
        if node.component(&name).is_none() {
            return Err(Error::InvalidCapability(format!(
                "default PageConfig for {} returned unknown component name: {}",
                node.name(),
                name
            )));
        }
        return Ok(name);
    }

    match node.component("Page") {
        Some(_) => Ok("Page".to_string()),
        None => Err(Error::InvalidCapability(format!(
            "no Page component or PageConfig method found for {}",
            node.name()
        ))),
    }
}

fn component_name(values: Vec<Arg>) -> Option<String> {
    let value = values.into_iter().next()?;
    match value.downcast::<String>() {
        Ok(name) => Some(name),
        Err(value) => value.downcast::<&'static str>().ok().map(str::to_string),
    }
}

/// Arguments for `component`: the output of `<component>Props`, else of
/// `Props`, else nothing.
fn get_props(
    ctx: &BuildContext,
    node: &Arc<PageNode>,
    component: &str,
    req: &Request,
) -> Result<Vec<Arg>> {
    let specific = format!("{}Props", component);
    let Some(resolver) = node.props(&specific).or_else(|| node.props("Props")) else {
        return Ok(Vec::new());
    };
    let mut inv = Invocation::new(
        format!("{}.{}", node.name(), resolver.name()),
        page_receiver(ctx, node)?,
        ctx.registry(),
    )
    .with_node(node)
    .with_request(req);
    resolver.call(&mut inv)?.strip_error().map_err(|cause| {
        Error::call(
            format!("error calling props component {}.{}", node.name(), resolver.name()),
            cause,
        )
    })
}
