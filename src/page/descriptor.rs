use std::marker::PhantomData;

use super::build::{build_child, TreeBuilder};
use super::node::NodeId;
use crate::component::{Component, IntoComponent};
use crate::error::{Error, Result};
use crate::invoke::{IntoOutput, Method, MethodRef, ReceiverKind, Returned, Shape};

/// A type that describes one node of a page tree.
///
/// `describe` declares the page's children and capability methods. It is
/// usually generated with `#[derive(Page)]`; writing it by hand is
/// equivalent:
///
/// ```rust
/// use pagetree::{Descriptor, Page};
///
/// #[derive(Default)]
/// struct About;
///
/// impl About {
///     fn page(&self) -> String {
///         "<h1>About</h1>".to_string()
///     }
/// }
///
/// impl Page for About {
///     fn describe(d: &mut Descriptor<Self>) {
///         d.component("Page", Self::page);
///     }
/// }
///
/// #[derive(Default)]
/// struct Site;
///
/// impl Page for Site {
///     fn describe(d: &mut Descriptor<Self>) {
///         d.child::<About>("about", "GET /about About us");
///     }
/// }
/// ```
pub trait Page: Send + Sync + 'static {
    fn describe(d: &mut Descriptor<Self>)
    where
        Self: Sized;
}

pub(crate) type ChildFactory =
    fn(&mut TreeBuilder<'_>, Option<NodeId>, &str, String, &str) -> Result<NodeId>;

pub(crate) struct ChildSpec {
    pub(crate) field: String,
    pub(crate) route: String,
    pub(crate) factory: ChildFactory,
}

/// Capability table for page type `P`, filled by [`Page::describe`].
pub struct Descriptor<P> {
    pub(crate) children: Vec<ChildSpec>,
    pub(crate) components: Vec<(String, MethodRef)>,
    pub(crate) props: Vec<(String, MethodRef)>,
    pub(crate) init: Option<MethodRef>,
    pub(crate) page_config: Option<MethodRef>,
    pub(crate) middlewares: Option<MethodRef>,
    pub(crate) handler: Option<MethodRef>,
    pub(crate) errors: Vec<Error>,
    _page: PhantomData<fn() -> P>,
}

impl<P: Page> Descriptor<P> {
    pub(crate) fn new() -> Self {
        Self {
            children: Vec::new(),
            components: Vec::new(),
            props: Vec::new(),
            init: None,
            page_config: None,
            middlewares: None,
            handler: None,
            errors: Vec::new(),
            _page: PhantomData,
        }
    }

    /// Declare a child page reached through `route` (see
    /// [`RouteSpec`](crate::RouteSpec) for the grammar). A fresh
    /// `C::default()` instance is built for it.
    pub fn child<C: Page + Default>(&mut self, field: &str, route: &str) -> &mut Self {
        self.children.push(ChildSpec {
            field: field.to_string(),
            route: route.to_string(),
            factory: build_child::<C>,
        });
        self
    }

    /// Called once, right after the node is built. May take `&mut self`.
    pub fn init<M, F>(&mut self, method: F) -> &mut Self
    where
        F: Method<P, M>,
        F::Output: IntoOutput,
    {
        let method = MethodRef::new::<P, M, F>("Init", method);
        self.set_once("Init", method, |d| &mut d.init)
    }

    /// A renderable variant of the page, selected by name per request.
    pub fn component<M, F>(&mut self, name: &str, method: F) -> &mut Self
    where
        F: Method<P, M>,
        F::Output: IntoComponent,
    {
        if self.components.iter().any(|(n, _)| n == name) {
            self.errors.push(Error::InvalidCapability(format!(
                "component {} declared twice",
                name
            )));
            return self;
        }
        let method = MethodRef::with_output::<P, M, F>(
            name,
            method,
            <F::Output as IntoComponent>::FALLIBLE,
            |out: F::Output| match out.into_component() {
                Ok(component) => Returned::value::<Box<dyn Component>>(component),
                Err(error) => Returned::failed(error),
            },
        );
        if self.reject_exclusive(&method) {
            return self;
        }
        self.components.push((name.to_string(), method));
        self
    }

    /// Props resolver. `name` is `Props` or `<Component>Props`.
    pub fn props<M, F>(&mut self, name: &str, method: F) -> &mut Self
    where
        F: Method<P, M>,
        F::Output: IntoOutput,
    {
        if !name.ends_with("Props") {
            self.errors.push(Error::InvalidCapability(format!(
                "props resolver {} must be named Props or <Component>Props",
                name
            )));
            return self;
        }
        let method = MethodRef::new::<P, M, F>(name, method);
        if self.reject_exclusive(&method) {
            return self;
        }
        self.props.push((name.to_string(), method));
        self
    }

    /// Per-request component selector returning a component name.
    pub fn page_config<M, F>(&mut self, method: F) -> &mut Self
    where
        F: Method<P, M>,
        F::Output: IntoOutput,
    {
        let method = MethodRef::new::<P, M, F>("PageConfig", method);
        if self.reject_exclusive(&method) {
            return self;
        }
        self.set_once("PageConfig", method, |d| &mut d.page_config)
    }

    /// Middleware provider returning `Vec<MiddlewareFunc>`.
    pub fn middlewares<M, F>(&mut self, method: F) -> &mut Self
    where
        F: Method<P, M>,
        F::Output: IntoOutput,
    {
        let method = MethodRef::new::<P, M, F>("Middlewares", method);
        if self.reject_exclusive(&method) {
            return self;
        }
        self.set_once("Middlewares", method, |d| &mut d.middlewares)
    }

    /// Full request handler taking the response writer and request.
    pub fn handler<M, F>(&mut self, method: F) -> &mut Self
    where
        F: Method<P, M>,
        F::Output: IntoOutput,
    {
        let method = MethodRef::new::<P, M, F>("ServeHTTP", method);
        if method.signature().shape != Shape::Handler {
            self.errors.push(Error::InvalidCapability(format!(
                "handler {} must take a response writer and a request",
                method
            )));
            return self;
        }
        if self.reject_exclusive(&method) {
            return self;
        }
        self.set_once("ServeHTTP", method, |d| &mut d.handler)
    }

    /// Request-time methods run on a shared page; only `init` may take
    /// `&mut self`.
    fn reject_exclusive(&mut self, method: &MethodRef) -> bool {
        if method.signature().receiver != ReceiverKind::Exclusive {
            return false;
        }
        self.errors.push(Error::InvalidCapability(format!(
            "{} is called per request and must take &self",
            method
        )));
        true
    }

    fn set_once(
        &mut self,
        what: &str,
        method: MethodRef,
        slot: fn(&mut Self) -> &mut Option<MethodRef>,
    ) -> &mut Self {
        if slot(self).is_some() {
            self.errors
                .push(Error::InvalidCapability(format!("{} declared twice", what)));
        } else {
            *slot(self) = Some(method);
        }
        self
    }
}
