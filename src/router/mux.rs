use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use http::header::ALLOW;
use http::{HeaderValue, StatusCode};
use tracing::{debug, warn};

use super::{ParamVec, PathParams, Router};
use crate::error::{Error, Result};
use crate::page::{join_path, METHOD_ANY};
use crate::server::{http_error, Handler, Request, ResponseWriter};

#[derive(Clone)]
enum Wildcard {
    /// `{name}`: exactly one segment.
    One(Arc<str>),
    /// `{name...}`: the rest of the path, possibly empty.
    Rest(Arc<str>),
}

/// Node in the radix tree. Static children are tried before parameter
/// children; a rest parameter only ever terminates a pattern.
#[derive(Clone, Default)]
struct MuxNode {
    segment: Cow<'static, str>,
    routes: HashMap<String, Handler>,
    children: Vec<MuxNode>,
    param_children: Vec<(Wildcard, MuxNode)>,
}

impl MuxNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: Cow::Owned(segment.to_string()),
            ..Self::default()
        }
    }

    fn insert(&mut self, segments: &[&str], method: &str, handler: Handler) -> Result<()> {
        let Some((&segment, remaining)) = segments.split_first() else {
            if self.routes.insert(method.to_string(), handler).is_some() {
                return Err(Error::Config(format!(
                    "route for method {} registered twice",
                    method
                )));
            }
            return Ok(());
        };

        if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let wildcard = match inner.strip_suffix("...") {
                Some(name) if remaining.is_empty() => Wildcard::Rest(Arc::from(name)),
                Some(_) => {
                    return Err(Error::Parse(format!(
                        "wildcard {} must be the last segment",
                        segment
                    )))
                }
                None => Wildcard::One(Arc::from(inner)),
            };
            for (existing, child) in &mut self.param_children {
                if same_wildcard(existing, &wildcard) {
                    return child.insert(remaining, method, handler);
                }
            }
            let mut child = MuxNode::default();
            child.insert(remaining, method, handler)?;
            self.param_children.push((wildcard, child));
            return Ok(());
        }

        for child in &mut self.children {
            if child.segment == segment {
                return child.insert(remaining, method, handler);
            }
        }
        let mut child = MuxNode::new(segment);
        child.insert(remaining, method, handler)?;
        self.children.push(child);
        Ok(())
    }

    /// Handler for `method`: exact, then `GET` for `HEAD`, then `ANY`.
    fn handler(&self, method: &str) -> Option<&Handler> {
        self.routes
            .get(method)
            .or_else(|| (method == "HEAD").then(|| self.routes.get("GET")).flatten())
            .or_else(|| self.routes.get(METHOD_ANY))
    }

    /// First node in match order that `accepts`. A rejected node sends the
    /// search on to the next candidate.
    fn search<'n>(
        &'n self,
        segments: &[&str],
        params: &mut ParamVec,
        accepts: &dyn Fn(&MuxNode) -> bool,
    ) -> Option<&'n MuxNode> {
        let Some((&segment, remaining)) = segments.split_first() else {
            if accepts(self) {
                return Some(self);
            }
            // A rest wildcard also matches the empty remainder.
            return self.param_children.iter().find_map(|(w, child)| match w {
                Wildcard::Rest(name) if accepts(child) => {
                    params.push((Arc::clone(name), String::new()));
                    Some(child)
                }
                _ => None,
            });
        };

        for child in &self.children {
            if child.segment == segment {
                if let Some(found) = child.search(remaining, params, accepts) {
                    return Some(found);
                }
            }
        }

        for (wildcard, child) in &self.param_children {
            match wildcard {
                Wildcard::One(name) => {
                    params.push((Arc::clone(name), segment.to_string()));
                    if let Some(found) = child.search(remaining, params, accepts) {
                        return Some(found);
                    }
                    // Backtrack
                    params.pop();
                }
                Wildcard::Rest(name) => {
                    if accepts(child) {
                        params.push((Arc::clone(name), segments.join("/")));
                        return Some(child);
                    }
                }
            }
        }
        None
    }
}

fn same_wildcard(a: &Wildcard, b: &Wildcard) -> bool {
    match (a, b) {
        (Wildcard::One(x), Wildcard::One(y)) | (Wildcard::Rest(x), Wildcard::Rest(y)) => x == y,
        _ => false,
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != "{$}")
        .collect()
}

/// Outcome of matching a request against a [`ServeMux`].
pub enum Lookup {
    Found(Handler, PathParams),
    /// The path matched but no handler accepts the method.
    MethodNotAllowed(Vec<String>),
    NotFound,
}

/// Radix-tree request multiplexer.
///
/// Patterns match whole segments: `/` matches only the root, `{name}` one
/// segment and a trailing `{name...}` the remainder. `ANY` routes accept
/// every method, but a route registered for the exact method wins. `GET`
/// routes also answer `HEAD`.
#[derive(Clone, Default)]
pub struct ServeMux {
    root: MuxNode,
    prefix: String,
    count: usize,
}

impl ServeMux {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered `(method, pattern)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Match `method` and `path`. A path whose most specific match lacks
    /// the method falls through to less specific patterns; the method is
    /// reported as not allowed only when none of them accepts it.
    pub fn lookup(&self, method: &str, path: &str) -> Lookup {
        let segments = split_segments(path);
        let method = method.to_ascii_uppercase();
        let mut params = ParamVec::new();
        if let Some(handler) = self
            .root
            .search(&segments, &mut params, &|n: &MuxNode| n.handler(&method).is_some())
            .and_then(|node| node.handler(&method))
        {
            return Lookup::Found(Arc::clone(handler), PathParams(params));
        }

        params.clear();
        match self.root.search(&segments, &mut params, &|n: &MuxNode| !n.routes.is_empty()) {
            Some(node) => {
                let mut allowed: Vec<String> = node.routes.keys().cloned().collect();
                allowed.sort();
                Lookup::MethodNotAllowed(allowed)
            }
            None => Lookup::NotFound,
        }
    }

    /// Dispatch `req`, recording the matched parameters on it.
    pub fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        let path = req.uri().path().to_string();
        match self.lookup(req.method().as_str(), &path) {
            Lookup::Found(handler, params) => {
                req.extensions_mut().insert(params);
                handler(w, req);
            }
            Lookup::MethodNotAllowed(allowed) => {
                debug!(method = %req.method(), path = %path, "method not allowed");
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    w.headers_mut().insert(ALLOW, value);
                }
                http_error(w, "Method Not Allowed", StatusCode::METHOD_NOT_ALLOWED);
            }
            Lookup::NotFound => {
                debug!(method = %req.method(), path = %path, "no route matched");
                http_error(w, "404 page not found", StatusCode::NOT_FOUND);
            }
        }
    }
}

impl Router for ServeMux {
    fn route(
        &mut self,
        path: &str,
        group: &mut dyn FnMut(&mut dyn Router) -> Result<()>,
    ) -> Result<()> {
        let saved = self.prefix.clone();
        self.prefix = join_path(&saved, path);
        debug!(prefix = %self.prefix, "route group");
        let result = group(self);
        self.prefix = saved;
        result
    }

    fn handle_method(&mut self, method: &str, path: &str, handler: Handler) -> Result<()> {
        let pattern = join_path(&self.prefix, path);
        let method = method.to_ascii_uppercase();
        self.root
            .insert(&split_segments(&pattern), &method, handler)
            .map_err(|e| {
                warn!(method = %method, pattern = %pattern, error = %e, "route rejected");
                Error::Config(format!("{} {}: {}", method, pattern, e))
            })?;
        self.count += 1;
        Ok(())
    }

    fn atomic(&mut self, batch: &mut dyn FnMut(&mut dyn Router) -> Result<()>) -> Result<()> {
        let mut staged = self.clone();
        batch(&mut staged)?;
        *self = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{handler_fn, request, ResponseRecorder};

    fn named(name: &'static str) -> Handler {
        handler_fn(move |w, req| {
            let params = req
                .extensions()
                .get::<PathParams>()
                .map(|p| {
                    p.iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();
            let _ = w.write_body(format!("{} {}", name, params).trim_end().as_bytes());
        })
    }

    fn serve(mux: &ServeMux, method: &str, path: &str) -> ResponseRecorder {
        let mut rec = ResponseRecorder::new();
        let mut req = request(method, path).unwrap();
        mux.serve(&mut rec, &mut req);
        rec
    }

    #[test]
    fn test_static_and_param_routes() {
        let mut mux = ServeMux::new();
        mux.handle_method("GET", "/users", named("list")).unwrap();
        mux.handle_method("GET", "/users/{id}", named("show")).unwrap();
        mux.handle_method("GET", "/users/{id}/posts/{post}", named("post"))
            .unwrap();
        assert_eq!(serve(&mux, "GET", "/users").body_string(), "list");
        assert_eq!(serve(&mux, "GET", "/users/7").body_string(), "show id=7");
        assert_eq!(
            serve(&mux, "GET", "/users/7/posts/9").body_string(),
            "post id=7,post=9"
        );
    }

    #[test]
    fn test_static_beats_param() {
        let mut mux = ServeMux::new();
        mux.handle_method("GET", "/users/{id}", named("show")).unwrap();
        mux.handle_method("GET", "/users/new", named("new")).unwrap();
        assert_eq!(serve(&mux, "GET", "/users/new").body_string(), "new");
        assert_eq!(serve(&mux, "GET", "/users/x").body_string(), "show id=x");
    }

    #[test]
    fn test_root_is_exact() {
        let mut mux = ServeMux::new();
        mux.handle_method(METHOD_ANY, "/", named("home")).unwrap();
        assert_eq!(serve(&mux, "GET", "/").body_string(), "home");
        assert_eq!(serve(&mux, "GET", "/missing").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_end_marker_is_ignored() {
        let mut mux = ServeMux::new();
        mux.handle_method("GET", "/{$}", named("home")).unwrap();
        assert_eq!(serve(&mux, "GET", "/").body_string(), "home");
    }

    #[test]
    fn test_rest_wildcard() {
        let mut mux = ServeMux::new();
        mux.handle_method("GET", "/files/{path...}", named("files"))
            .unwrap();
        assert_eq!(
            serve(&mux, "GET", "/files/a/b.txt").body_string(),
            "files path=a/b.txt"
        );
        assert_eq!(serve(&mux, "GET", "/files").body_string(), "files path=");
        assert!(mux
            .handle_method("GET", "/bad/{rest...}/tail", named("bad"))
            .is_err());
    }

    #[test]
    fn test_method_dispatch() {
        let mut mux = ServeMux::new();
        mux.handle_method(METHOD_ANY, "/items", named("any")).unwrap();
        mux.handle_method("POST", "/items", named("create")).unwrap();
        mux.handle_method("GET", "/only-get", named("get")).unwrap();
        assert_eq!(serve(&mux, "POST", "/items").body_string(), "create");
        assert_eq!(serve(&mux, "DELETE", "/items").body_string(), "any");
        assert_eq!(serve(&mux, "HEAD", "/only-get").body_string(), "get");

        let rec = serve(&mux, "PUT", "/only-get");
        assert_eq!(rec.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(rec.header("allow"), Some("GET"));
    }

    #[test]
    fn test_route_groups_prefix_patterns() {
        let mut mux = ServeMux::new();
        mux.route("/admin", &mut |r| {
            r.route("/users", &mut |r| r.handle_method("GET", "/{id}", named("user")))?;
            r.handle_method("GET", "/", named("dash"))
        })
        .unwrap();
        assert_eq!(mux.len(), 2);
        assert_eq!(serve(&mux, "GET", "/admin").body_string(), "dash");
        assert_eq!(serve(&mux, "GET", "/admin/users/3").body_string(), "user id=3");
        assert_eq!(serve(&mux, "GET", "/users/3").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut mux = ServeMux::new();
        mux.handle_method("GET", "/a", named("a")).unwrap();
        let err = mux.handle_method("get", "/a", named("b")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_different_param_names_same_position() {
        let mut mux = ServeMux::new();
        mux.handle_method("GET", "/users/{user_id}/posts", named("posts"))
            .unwrap();
        mux.handle_method("GET", "/users/{id}/comments", named("comments"))
            .unwrap();
        assert_eq!(
            serve(&mux, "GET", "/users/1/posts").body_string(),
            "posts user_id=1"
        );
        assert_eq!(
            serve(&mux, "GET", "/users/2/comments").body_string(),
            "comments id=2"
        );
    }

    #[test]
    fn test_method_mismatch_falls_through_to_param_route() {
        let mut mux = ServeMux::new();
        mux.handle_method("POST", "/users/new", named("create")).unwrap();
        mux.handle_method("GET", "/users/{id}", named("show")).unwrap();
        assert_eq!(serve(&mux, "GET", "/users/new").body_string(), "show id=new");
        assert_eq!(serve(&mux, "POST", "/users/new").body_string(), "create");

        let rec = serve(&mux, "DELETE", "/users/new");
        assert_eq!(rec.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(rec.header("allow"), Some("POST"));
    }

    #[test]
    fn test_failed_batch_keeps_mux_unchanged() {
        let mut mux = ServeMux::new();
        mux.handle_method("GET", "/a", named("a")).unwrap();
        let err = mux
            .atomic(&mut |r| {
                r.handle_method("GET", "/b", named("b"))?;
                r.handle_method("GET", "/a", named("again"))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(mux.len(), 1);
        assert_eq!(serve(&mux, "GET", "/b").status(), StatusCode::NOT_FOUND);
        assert_eq!(serve(&mux, "GET", "/a").body_string(), "a");
    }
}
