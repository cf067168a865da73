use std::any::{type_name, Any};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::output::{IntoOutput, Returned};
use super::params::Param;
use crate::error::{Error, Result};
use crate::page::PageNode;
use crate::registry::TypeRegistry;
use crate::server::{Request, ResponseWriter};

/// How a method borrows its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverKind {
    /// `&P`, callable at build time and per request.
    Shared,
    /// `&mut P`, callable only while the tree is being built.
    Exclusive,
}

/// Fixed leading arguments a method takes after its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Plain,
    Request,
    Handler,
}

/// Declared signature of an erased method.
#[derive(Debug, Clone)]
pub struct Signature {
    pub receiver: ReceiverKind,
    pub shape: Shape,
    pub page: &'static str,
    /// Type names of the injectable parameters, in declaration order.
    pub params: Vec<&'static str>,
    pub output: &'static str,
    /// The output carries a trailing error.
    pub fallible: bool,
}

impl Signature {
    #[doc(hidden)]
    pub fn new<P: ?Sized, R>(receiver: ReceiverKind, shape: Shape, params: Vec<&'static str>) -> Self {
        Self {
            receiver,
            shape,
            page: type_name::<P>(),
            params,
            output: type_name::<R>(),
            fallible: false,
        }
    }
}

/// An explicit, type-erased argument.
pub struct Arg {
    value: Box<dyn Any>,
    type_name: &'static str,
}

impl Arg {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Take the value out, or get the argument back unchanged.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Arg> {
        let type_name = self.type_name;
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|value| Arg { value, type_name })
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Arg<{}>", self.type_name)
    }
}

/// The page instance a method is called on.
pub enum Receiver<'a> {
    Shared {
        value: &'a (dyn Any + Send + Sync),
        type_name: &'static str,
    },
    Exclusive {
        value: &'a mut (dyn Any + Send + Sync),
        type_name: &'static str,
    },
}

impl<'a> Receiver<'a> {
    pub fn shared<P: Any + Send + Sync>(page: &'a P) -> Self {
        Receiver::Shared {
            value: page,
            type_name: type_name::<P>(),
        }
    }

    pub fn exclusive<P: Any + Send + Sync>(page: &'a mut P) -> Self {
        Receiver::Exclusive {
            value: page,
            type_name: type_name::<P>(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Receiver::Shared { type_name, .. } | Receiver::Exclusive { type_name, .. } => *type_name,
        }
    }

    fn get<P: 'static>(&self, method: &str) -> Result<&P> {
        let value: &(dyn Any + Send + Sync) = match self {
            Receiver::Shared { value, .. } => *value,
            Receiver::Exclusive { value, .. } => &**value,
        };
        value.downcast_ref::<P>().ok_or_else(|| Error::ReceiverMismatch {
            method: method.to_string(),
            expected: format!("&{}", type_name::<P>()),
            actual: self.type_name().to_string(),
        })
    }

    fn get_mut<P: 'static>(&mut self, method: &str) -> Result<&mut P> {
        let actual = self.type_name();
        match self {
            Receiver::Exclusive { value, .. } => {
                value
                    .downcast_mut::<P>()
                    .ok_or_else(|| Error::ReceiverMismatch {
                        method: method.to_string(),
                        expected: format!("&mut {}", type_name::<P>()),
                        actual: actual.to_string(),
                    })
            }
            Receiver::Shared { .. } => Err(Error::ReceiverMismatch {
                method: method.to_string(),
                expected: format!("&mut {}", type_name::<P>()),
                actual: format!("&{} (shared)", actual),
            }),
        }
    }
}

/// Sources a parameter may be injected from.
#[derive(Clone, Copy)]
pub struct Injector<'a> {
    registry: &'a TypeRegistry,
    node: Option<&'a Arc<PageNode>>,
}

impl<'a> Injector<'a> {
    #[must_use]
    pub fn new(registry: &'a TypeRegistry, node: Option<&'a Arc<PageNode>>) -> Self {
        Self { registry, node }
    }

    #[must_use]
    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    #[must_use]
    pub fn node(&self) -> Option<&'a Arc<PageNode>> {
        self.node
    }
}

/// One call of a [`MethodRef`]: receiver, request context and arguments.
pub struct Invocation<'a> {
    method: String,
    receiver: Receiver<'a>,
    request: Option<&'a Request>,
    writer: Option<&'a mut dyn ResponseWriter>,
    args: VecDeque<Arg>,
    registry: &'a TypeRegistry,
    node: Option<&'a Arc<PageNode>>,
    bound: usize,
}

impl<'a> Invocation<'a> {
    /// `method` is the qualified name used in error messages, e.g. `Index.Page`.
    pub fn new(method: impl Into<String>, receiver: Receiver<'a>, registry: &'a TypeRegistry) -> Self {
        Self {
            method: method.into(),
            receiver,
            request: None,
            writer: None,
            args: VecDeque::new(),
            registry,
            node: None,
            bound: 0,
        }
    }

    #[must_use]
    pub fn with_node(mut self, node: &'a Arc<PageNode>) -> Self {
        self.node = Some(node);
        self
    }

    #[must_use]
    pub fn with_request(mut self, request: &'a Request) -> Self {
        self.request = Some(request);
        self
    }

    #[must_use]
    pub fn with_writer(mut self, writer: &'a mut dyn ResponseWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = Arg>) -> Self {
        self.args.extend(args);
        self
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[doc(hidden)]
    pub fn check_arity(&self, declared: usize) -> Result<()> {
        if self.args.len() > declared {
            return Err(Error::TooManyArguments {
                method: self.method.clone(),
                expected: declared,
                actual: self.args.len(),
            });
        }
        Ok(())
    }

    /// Bind the next parameter: an explicit argument if one is left,
    /// otherwise an injected value.
    #[doc(hidden)]
    pub fn bind<A: Param>(&mut self) -> Result<A> {
        let index = self.bound;
        self.bound += 1;
        if let Some(arg) = self.args.pop_front() {
            return A::from_arg(arg).map_err(|arg| Error::ArgumentTypeMismatch {
                method: self.method.clone(),
                index,
                expected: A::type_name(),
                actual: arg.type_name(),
            });
        }
        let injector = Injector::new(self.registry, self.node);
        A::inject(&injector)?.ok_or_else(|| Error::MissingArgument {
            method: self.method.clone(),
            type_name: A::type_name(),
        })
    }

    #[doc(hidden)]
    pub fn page<P: 'static>(&self) -> Result<&P> {
        self.receiver.get::<P>(&self.method)
    }

    #[doc(hidden)]
    pub fn page_mut<P: 'static>(&mut self) -> Result<&mut P> {
        self.receiver.get_mut::<P>(&self.method)
    }

    #[doc(hidden)]
    pub fn page_and_request<P: 'static>(&self) -> Result<(&P, &Request)> {
        let page = self.page::<P>()?;
        let request = self
            .request
            .ok_or_else(|| missing_context(&self.method, "a request"))?;
        Ok((page, request))
    }

    #[doc(hidden)]
    pub fn handler_parts<P: 'static>(&mut self) -> Result<(&P, &mut dyn ResponseWriter, &Request)> {
        let Invocation {
            method,
            receiver,
            request,
            writer,
            ..
        } = self;
        let page = receiver.get::<P>(method)?;
        let request: &Request = request.ok_or_else(|| missing_context(method, "a request"))?;
        let writer: &mut dyn ResponseWriter = match writer {
            Some(writer) => &mut **writer,
            None => return Err(missing_context(method, "a response writer")),
        };
        Ok((page, writer, request))
    }
}

fn missing_context(method: &str, what: &str) -> Error {
    Error::InvalidCapability(format!("method {} must be called with {}", method, what))
}

type ErasedCall = dyn Fn(&mut Invocation<'_>) -> Result<Returned> + Send + Sync;

/// A resolved, invocable capability method.
#[derive(Clone)]
pub struct MethodRef {
    name: Arc<str>,
    signature: Arc<Signature>,
    call: Arc<ErasedCall>,
}

impl MethodRef {
    pub fn new<P, M, F>(name: &str, method: F) -> Self
    where
        P: 'static,
        F: Method<P, M>,
        F::Output: IntoOutput,
    {
        Self::with_output(
            name,
            method,
            <F::Output as IntoOutput>::FALLIBLE,
            <F::Output as IntoOutput>::into_returned,
        )
    }

    pub(crate) fn with_output<P, M, F>(
        name: &str,
        method: F,
        fallible: bool,
        map: fn(F::Output) -> Returned,
    ) -> Self
    where
        P: 'static,
        F: Method<P, M>,
    {
        let mut signature = F::signature();
        signature.fallible = fallible;
        let call: Arc<ErasedCall> =
            Arc::new(move |inv: &mut Invocation<'_>| method.invoke(inv).map(map));
        Self {
            name: Arc::from(name),
            signature: Arc::new(signature),
            call,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, inv: &mut Invocation<'_>) -> Result<Returned> {
        (self.call)(inv)
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", short_type_name(self.signature.page), self.name)
    }
}

/// `crate::pages::Index<T>` -> `Index<T>`
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// A function usable as a capability method on page type `P`.
///
/// `M` is a marker chosen by the implementation (receiver, shape and
/// parameter list) and is always inferred.
pub trait Method<P, M>: Send + Sync + 'static {
    type Output: 'static;

    fn signature() -> Signature;

    fn invoke(&self, inv: &mut Invocation<'_>) -> Result<Self::Output>;
}

#[doc(hidden)]
pub mod markers {
    pub struct SharedRef;
    pub struct ExclusiveRef;
    pub struct Plain;
    pub struct WithRequest;
    pub struct WithWriter;
}

use markers::{ExclusiveRef, Plain, SharedRef, WithRequest, WithWriter};

macro_rules! count {
    () => (0usize);
    ($head:ident $($tail:ident)*) => (1usize + count!($($tail)*));
}

macro_rules! impl_method {
    ($($ty:ident),*) => {
        impl<F, P, R, $($ty,)*> Method<P, (SharedRef, Plain, ($($ty,)*))> for F
        where
            F: Fn(&P, $($ty,)*) -> R + Send + Sync + 'static,
            P: 'static,
            R: 'static,
            $($ty: Param,)*
        {
            type Output = R;

            fn signature() -> Signature {
                Signature::new::<P, R>(
                    ReceiverKind::Shared,
                    Shape::Plain,
                    vec![$(<$ty as Param>::type_name(),)*],
                )
            }

            #[allow(non_snake_case)]
            fn invoke(&self, inv: &mut Invocation<'_>) -> Result<R> {
                inv.check_arity(count!($($ty)*))?;
                inv.page::<P>()?;
                $(let $ty = inv.bind::<$ty>()?;)*
                let page = inv.page::<P>()?;
                Ok(self(page, $($ty,)*))
            }
        }

        impl<F, P, R, $($ty,)*> Method<P, (ExclusiveRef, Plain, ($($ty,)*))> for F
        where
            F: Fn(&mut P, $($ty,)*) -> R + Send + Sync + 'static,
            P: 'static,
            R: 'static,
            $($ty: Param,)*
        {
            type Output = R;

            fn signature() -> Signature {
                Signature::new::<P, R>(
                    ReceiverKind::Exclusive,
                    Shape::Plain,
                    vec![$(<$ty as Param>::type_name(),)*],
                )
            }

            #[allow(non_snake_case)]
            fn invoke(&self, inv: &mut Invocation<'_>) -> Result<R> {
                inv.check_arity(count!($($ty)*))?;
                inv.page_mut::<P>()?;
                $(let $ty = inv.bind::<$ty>()?;)*
                let page = inv.page_mut::<P>()?;
                Ok(self(page, $($ty,)*))
            }
        }

        impl<F, P, R, $($ty,)*> Method<P, (SharedRef, WithRequest, ($($ty,)*))> for F
        where
            F: Fn(&P, &Request, $($ty,)*) -> R + Send + Sync + 'static,
            P: 'static,
            R: 'static,
            $($ty: Param,)*
        {
            type Output = R;

            fn signature() -> Signature {
                Signature::new::<P, R>(
                    ReceiverKind::Shared,
                    Shape::Request,
                    vec![$(<$ty as Param>::type_name(),)*],
                )
            }

            #[allow(non_snake_case)]
            fn invoke(&self, inv: &mut Invocation<'_>) -> Result<R> {
                inv.check_arity(count!($($ty)*))?;
                inv.page_and_request::<P>()?;
                $(let $ty = inv.bind::<$ty>()?;)*
                let (page, request) = inv.page_and_request::<P>()?;
                Ok(self(page, request, $($ty,)*))
            }
        }

        impl<F, P, R, $($ty,)*> Method<P, (SharedRef, WithWriter, ($($ty,)*))> for F
        where
            F: Fn(&P, &mut dyn ResponseWriter, &Request, $($ty,)*) -> R + Send + Sync + 'static,
            P: 'static,
            R: 'static,
            $($ty: Param,)*
        {
            type Output = R;

            fn signature() -> Signature {
                Signature::new::<P, R>(
                    ReceiverKind::Shared,
                    Shape::Handler,
                    vec![$(<$ty as Param>::type_name(),)*],
                )
            }

            #[allow(non_snake_case)]
            fn invoke(&self, inv: &mut Invocation<'_>) -> Result<R> {
                inv.check_arity(count!($($ty)*))?;
                inv.handler_parts::<P>()?;
                $(let $ty = inv.bind::<$ty>()?;)*
                let (page, writer, request) = inv.handler_parts::<P>()?;
                Ok(self(page, writer, request, $($ty,)*))
            }
        }
    };
}

impl_method!();
impl_method!(A1);
impl_method!(A1, A2);
impl_method!(A1, A2, A3);
impl_method!(A1, A2, A3, A4);
impl_method!(A1, A2, A3, A4, A5);
impl_method!(A1, A2, A3, A4, A5, A6);
