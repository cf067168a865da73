//! # Method Invoker
//!
//! Capability methods (`init`, props resolvers, components, page-config
//! selectors, middleware providers, full handlers) are ordinary Rust
//! functions taking the page by reference. This module erases them into
//! [`MethodRef`]s that can be stored on a page node and called later with:
//!
//! - the page instance as receiver (`&P`, or `&mut P` while building),
//! - the current request and response writer, for request-shaped methods,
//! - explicit arguments bound positionally,
//! - everything else injected from the current node or the
//!   [`TypeRegistry`](crate::TypeRegistry).
//!
//! ## Method shapes
//!
//! | Shape | Signature |
//! |---|---|
//! | plain | `fn(&P, A1, .., An) -> R` or `fn(&mut P, A1, .., An) -> R` |
//! | request | `fn(&P, &Request, A1, .., An) -> R` |
//! | handler | `fn(&P, &mut dyn ResponseWriter, &Request, A1, .., An) -> R` |
//!
//! Each `Ai` implements [`Param`]; up to six are supported. `R` is
//! normalised through [`IntoOutput`], which also recognises a trailing
//! `Result` as the method's failure channel.

mod core;
mod output;
mod params;

pub use self::core::{
    markers, Arg, Injector, Invocation, Method, MethodRef, Receiver, ReceiverKind, Shape,
    Signature,
};
pub(crate) use self::core::short_type_name;
pub use self::output::{IntoOutput, Returned};
pub use self::params::{Dep, Param, Props};
