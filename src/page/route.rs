//! Route metadata grammar: `[METHOD] PATH [TITLE...]`.
//!
//! | Tokens | Result |
//! |---|---|
//! | none | `ANY /` |
//! | `PATH` | `ANY PATH` |
//! | `METHOD PATH TITLE...` | method, path and the remaining tokens as title |
//! | `PATH TITLE...` | `ANY PATH`, remaining tokens as title |
//!
//! The method token is matched case-insensitively and stored upper-case.

use std::fmt;

use crate::error::{Error, Result};
use crate::url_for::template::parse_segments;

/// Method value that matches every verb.
pub const METHOD_ANY: &str = "ANY";

const METHODS: [&str; 10] = [
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE", METHOD_ANY,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: String,
    pub path: String,
    pub title: String,
}

impl RouteSpec {
    /// Parse route metadata. Fails only when the path holds an unmatched `{`.
    pub fn parse(meta: &str) -> Result<Self> {
        let tokens: Vec<&str> = meta.split_whitespace().collect();
        let spec = match tokens.as_slice() {
            [] => RouteSpec::new(METHOD_ANY, "/", ""),
            [path] => RouteSpec::new(METHOD_ANY, path, ""),
            [first, path, title @ ..] if is_method(first) => {
                RouteSpec::new(&first.to_ascii_uppercase(), path, &title.join(" "))
            }
            [path, title @ ..] => RouteSpec::new(METHOD_ANY, path, &title.join(" ")),
        };
        parse_segments(&spec.path)
            .map_err(|e| Error::Parse(format!("route {:?}: {}", meta, e)))?;
        Ok(spec)
    }

    fn new(method: &str, path: &str, title: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            title: title.to_string(),
        }
    }

    /// Whether the method matches every verb.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.method == METHOD_ANY
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if !self.title.is_empty() {
            write!(f, " {}", self.title)?;
        }
        Ok(())
    }
}

fn is_method(token: &str) -> bool {
    METHODS.iter().any(|m| m.eq_ignore_ascii_case(token))
}

/// Join route fragments and clean the result: repeated slashes collapse,
/// `.` and `..` elements resolve, and a trailing slash is dropped except on
/// the root. Empty fragments are ignored.
#[must_use]
pub fn join_path(base: &str, route: &str) -> String {
    let joined = match (base.is_empty(), route.is_empty()) {
        (true, true) => return String::new(),
        (true, false) => route.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, route),
    };
    clean_path(&joined)
}

fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let body = parts.join("/");
    match (rooted, body.is_empty()) {
        (true, _) => format!("/{}", body),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(method: &str, path: &str, title: &str) -> RouteSpec {
        RouteSpec::new(method, path, title)
    }

    #[test]
    fn test_route_grammar() {
        let cases = [
            ("", spec("ANY", "/", "")),
            ("   ", spec("ANY", "/", "")),
            ("/", spec("ANY", "/", "")),
            ("/about", spec("ANY", "/about", "")),
            ("GET /", spec("GET", "/", "")),
            ("post /submit", spec("POST", "/submit", "")),
            ("/about About Us", spec("ANY", "/about", "About Us")),
            ("PUT /example Update Example", spec("PUT", "/example", "Update Example")),
            ("any /x  Spaced   Title", spec("ANY", "/x", "Spaced Title")),
            (
                "INVALID /example Invalid Method",
                spec("ANY", "INVALID", "/example Invalid Method"),
            ),
        ];
        for (meta, expected) in cases {
            assert_eq!(RouteSpec::parse(meta).unwrap(), expected, "meta {:?}", meta);
        }
    }

    #[test]
    fn test_unmatched_brace_is_parse_error() {
        let err = RouteSpec::parse("GET /users/{id").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_display_round_trips() {
        let parsed = RouteSpec::parse("delete /items/{id} Remove").unwrap();
        assert_eq!(parsed.to_string(), "DELETE /items/{id} Remove");
        assert_eq!(RouteSpec::parse(&parsed.to_string()).unwrap(), parsed);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "/a"), "/a");
        assert_eq!(join_path("/a", "/"), "/a");
        assert_eq!(join_path("/a", "b"), "/a/b");
        assert_eq!(join_path("/a/", "/b/"), "/a/b");
        assert_eq!(join_path("", "/x"), "/x");
        assert_eq!(join_path("/", "/"), "/");
        assert_eq!(join_path("/a/b", "../c"), "/a/c");
        assert_eq!(join_path("/", "/{$}"), "/{$}");
        assert_eq!(join_path("/files", "{path...}"), "/files/{path...}");
        assert_eq!(join_path("", ""), "");
    }
}
