//! HTMX-aware component selection.
//!
//! [`htmx_page_config`] picks the component named after the `HX-Target`
//! header of an HTMX request, so a page can expose one component per
//! swappable region:
//!
//! | Request | Component |
//! |---|---|
//! | not HTMX, or no `HX-Target` | `Page` |
//! | `HX-Target: content` | `Content` |
//! | `HX-Target: todo-list` | `TodoList` |
//!
//! Install it for every page with
//! [`Pages::with_default_page_config`](crate::Pages::with_default_page_config).

use crate::server::Request;

/// Whether the request was issued by HTMX (`HX-Request: true`).
#[must_use]
pub fn is_htmx(req: &Request) -> bool {
    req.headers()
        .get("hx-request")
        .is_some_and(|v| v.as_bytes() == b"true")
}

/// Component selector driven by the `HX-Target` header.
pub fn htmx_page_config(req: &Request) -> anyhow::Result<String> {
    if is_htmx(req) {
        if let Some(target) = req.headers().get("hx-target") {
            let target = target.to_str()?;
            if !target.is_empty() {
                return Ok(mixed_case(target));
            }
        }
    }
    Ok("Page".to_string())
}

/// `todo-list` -> `TodoList`. Targets containing spaces are not valid ids
/// and map to the empty string.
#[must_use]
pub fn mixed_case(s: &str) -> String {
    if s.contains(' ') {
        return String::new();
    }
    s.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::request;

    fn htmx_request(target: Option<&str>) -> Request {
        let mut req = request("GET", "/").unwrap();
        req.headers_mut()
            .insert("HX-Request", http::HeaderValue::from_static("true"));
        if let Some(target) = target {
            req.headers_mut()
                .insert("HX-Target", http::HeaderValue::from_str(target).unwrap());
        }
        req
    }

    #[test]
    fn test_mixed_case() {
        assert_eq!(mixed_case("content"), "Content");
        assert_eq!(mixed_case("todo-list"), "TodoList");
        assert_eq!(mixed_case("hx-target"), "HxTarget");
        assert_eq!(mixed_case(""), "");
        assert_eq!(mixed_case("two words"), "");
    }

    #[test]
    fn test_plain_request_selects_page() {
        let req = request("GET", "/").unwrap();
        assert!(!is_htmx(&req));
        assert_eq!(htmx_page_config(&req).unwrap(), "Page");
    }

    #[test]
    fn test_htmx_target_selects_component() {
        assert_eq!(htmx_page_config(&htmx_request(Some("todo-list"))).unwrap(), "TodoList");
        assert_eq!(htmx_page_config(&htmx_request(None)).unwrap(), "Page");
    }
}
