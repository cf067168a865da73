//! Error taxonomy shared by the tree builder, the method invoker, the handler
//! compiler and the URL resolver.
//!
//! Build-time errors are returned from [`Pages::mount`](crate::Pages::mount)
//! and abort the whole mount. Request-time errors are handed to the configured
//! error callback and never reach the caller.

use std::fmt;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed route metadata, unmatched template braces or an invalid page shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Two values with the same type identity and orientation were registered.
    #[error("duplicate type {type_name} in type registry")]
    DuplicateType { type_name: &'static str },

    #[error("method {method} receiver type mismatch: expected {expected}, got {actual}")]
    ReceiverMismatch {
        method: String,
        expected: String,
        actual: String,
    },

    #[error("method {method} argument {index} type mismatch: expected {expected}, got {actual}")]
    ArgumentTypeMismatch {
        method: String,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("method {method} expects at most {expected} arguments, but got {actual}")]
    TooManyArguments {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// No explicit argument, node or registry entry satisfied a parameter.
    #[error("method {method} requires argument of type {type_name}, but none was registered")]
    MissingArgument {
        method: String,
        type_name: &'static str,
    },

    /// More than one declared capability provider satisfies a shared lookup.
    #[error("capability {type_name} is ambiguous: provided by {}", .candidates.join(", "))]
    AmbiguousCapability {
        type_name: &'static str,
        candidates: Vec<&'static str>,
    },

    #[error("{0}")]
    InvalidCapability(String),

    /// A component failed while rendering into the response buffer.
    #[error("{0:#}")]
    Render(anyhow::Error),

    /// A full request handler reported failure.
    #[error("{0:#}")]
    Handler(anyhow::Error),

    /// A capability method reported failure through its trailing error.
    #[error("{context}: {cause:#}")]
    Call {
        context: String,
        cause: anyhow::Error,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("pattern {pattern}: not enough arguments provided, args: [{}]", .args.join(", "))]
    NotEnoughArguments { pattern: String, args: Vec<String> },

    /// A build failure tagged with the page node it happened on.
    #[error("page {node}: {source}")]
    Node { node: String, source: Box<Error> },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn call(context: impl fmt::Display, cause: anyhow::Error) -> Self {
        Error::Call {
            context: context.to_string(),
            cause,
        }
    }

    pub(crate) fn at_node(node: &str, source: Error) -> Self {
        Error::Node {
            node: node.to_string(),
            source: Box::new(source),
        }
    }

    /// Walks through [`Error::Node`] wrappers to the underlying failure.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::Node { source, .. } => source.root(),
            other => other,
        }
    }
}
