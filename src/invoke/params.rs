use std::any::{type_name, Any, TypeId};
use std::ops::Deref;
use std::sync::Arc;

use super::core::{Arg, Injector};
use crate::error::Result;
use crate::page::PageNode;

/// A parameter a capability method may declare after its fixed arguments.
///
/// Binding tries the next explicit argument first ([`Param::from_arg`]);
/// once those run out, [`Param::inject`] resolves the value from the current
/// node or the registry. `Ok(None)` from `inject` means "not available" and
/// surfaces as [`Error::MissingArgument`](crate::Error::MissingArgument).
pub trait Param: Sized + 'static {
    fn type_name() -> &'static str {
        type_name::<Self>()
    }

    fn from_arg(arg: Arg) -> std::result::Result<Self, Arg>;

    fn inject(injector: &Injector<'_>) -> Result<Option<Self>>;
}

/// An owned clone of a registered value (the value orientation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dep<T>(pub T);

impl<T> Deref for Dep<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Dep<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// A value that is only ever bound from explicit arguments, typically the
/// output of a props resolver. Also usable as a return type to hand back an
/// arbitrary value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Props<T>(pub T);

impl<T> Deref for Props<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Props<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// The current node as `T`, when `T` is the node's own type.
fn node_as<T: Any>(injector: &Injector<'_>, owned: bool) -> Option<T> {
    let node = injector.node()?;
    let boxed: Box<dyn Any> = if owned {
        Box::new(PageNode::clone(node))
    } else {
        Box::new(Arc::clone(node))
    };
    boxed.downcast::<T>().ok().map(|b| *b)
}

impl<T: ?Sized + Send + Sync + 'static> Param for Arc<T> {
    fn type_name() -> &'static str {
        type_name::<T>()
    }

    fn from_arg(arg: Arg) -> std::result::Result<Self, Arg> {
        arg.downcast::<Arc<T>>()
    }

    fn inject(injector: &Injector<'_>) -> Result<Option<Self>> {
        if TypeId::of::<T>() == TypeId::of::<PageNode>() {
            return Ok(node_as::<Arc<T>>(injector, false));
        }
        injector.registry().get_shared::<T>()
    }
}

impl<T: Clone + Send + Sync + 'static> Param for Dep<T> {
    fn type_name() -> &'static str {
        type_name::<T>()
    }

    fn from_arg(arg: Arg) -> std::result::Result<Self, Arg> {
        arg.downcast::<T>().map(Dep)
    }

    fn inject(injector: &Injector<'_>) -> Result<Option<Self>> {
        if TypeId::of::<T>() == TypeId::of::<PageNode>() {
            return Ok(node_as::<T>(injector, true).map(Dep));
        }
        Ok(injector.registry().get::<T>().map(Dep))
    }
}

impl Param for PageNode {
    fn from_arg(arg: Arg) -> std::result::Result<Self, Arg> {
        arg.downcast::<PageNode>()
    }

    fn inject(injector: &Injector<'_>) -> Result<Option<Self>> {
        Ok(injector.node().map(|node| PageNode::clone(node)))
    }
}

impl<T: 'static> Param for Props<T> {
    fn type_name() -> &'static str {
        type_name::<T>()
    }

    fn from_arg(arg: Arg) -> std::result::Result<Self, Arg> {
        arg.downcast::<T>().map(Props)
    }

    fn inject(_injector: &Injector<'_>) -> Result<Option<Self>> {
        Ok(None)
    }
}

/// Optional dependency: resolves to `None` instead of failing when absent.
impl<P: Param> Param for Option<P> {
    fn type_name() -> &'static str {
        P::type_name()
    }

    fn from_arg(arg: Arg) -> std::result::Result<Self, Arg> {
        P::from_arg(arg).map(Some)
    }

    fn inject(injector: &Injector<'_>) -> Result<Option<Self>> {
        Ok(Some(P::inject(injector)?))
    }
}
