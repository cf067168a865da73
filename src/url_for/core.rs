use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::template::{format_path_segments, UrlArg};
use super::UrlParams;
use crate::error::{Error, Result};
use crate::invoke::short_type_name;
use crate::page::{PageNode, PageTree};
use crate::pages::BuildContext;
use crate::server::Request;

type NodePredicate = dyn Fn(&PageNode) -> bool + Send + Sync;

/// One piece of a reverse-lookup target.
#[derive(Clone)]
pub enum UrlPart {
    /// The first node whose page is of this type.
    Page(TypeId, &'static str),
    /// The first node satisfying the predicate.
    Matching(Arc<NodePredicate>),
    /// Text appended verbatim, e.g. a query string template.
    Literal(String),
}

impl UrlPart {
    #[must_use]
    pub fn page<P: Any>() -> Self {
        UrlPart::Page(TypeId::of::<P>(), type_name::<P>())
    }

    pub fn matching(pred: impl Fn(&PageNode) -> bool + Send + Sync + 'static) -> Self {
        UrlPart::Matching(Arc::new(pred))
    }
}

impl fmt::Debug for UrlPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPart::Page(_, name) => write!(f, "Page({})", short_type_name(name)),
            UrlPart::Matching(_) => f.write_str("Matching(..)"),
            UrlPart::Literal(s) => write!(f, "Literal({:?})", s),
        }
    }
}

impl From<&str> for UrlPart {
    fn from(s: &str) -> Self {
        UrlPart::Literal(s.to_string())
    }
}

impl From<String> for UrlPart {
    fn from(s: String) -> Self {
        UrlPart::Literal(s)
    }
}

/// Ordered list of parts whose routes and literals are concatenated into a
/// single template.
#[derive(Debug, Clone)]
pub struct UrlPattern(pub Vec<UrlPart>);

impl From<UrlPart> for UrlPattern {
    fn from(part: UrlPart) -> Self {
        UrlPattern(vec![part])
    }
}

impl From<Vec<UrlPart>> for UrlPattern {
    fn from(parts: Vec<UrlPart>) -> Self {
        UrlPattern(parts)
    }
}

impl<const N: usize> From<[UrlPart; N]> for UrlPattern {
    fn from(parts: [UrlPart; N]) -> Self {
        UrlPattern(parts.into())
    }
}

impl PageTree {
    /// Full route of the first node, in pre-order, that `part` selects.
    pub fn route_of(&self, part: &UrlPart) -> Result<String> {
        let found = match part {
            UrlPart::Literal(s) => return Ok(s.clone()),
            UrlPart::Page(id, _) => self.find(|n| n.page_type() == *id),
            UrlPart::Matching(pred) => self.find(|n| pred(n)),
        };
        match found {
            Some(node) => Ok(node.full_route().to_string()),
            None => Err(Error::NotFound(match part {
                UrlPart::Page(_, name) => {
                    format!("no page node found for {}", short_type_name(name))
                }
                _ => "no page node found for predicate".to_string(),
            })),
        }
    }

    /// Build a URL: concatenate the routes of `target`, fill the template
    /// and drop the first `{$}` marker.
    pub fn url_for(
        &self,
        params: Option<&UrlParams>,
        target: &UrlPattern,
        args: &[UrlArg],
    ) -> Result<String> {
        let mut pattern = String::new();
        for part in &target.0 {
            pattern.push_str(&self.route_of(part)?);
        }
        let path = format_path_segments(&pattern, params, args)?;
        Ok(path.replacen("{$}", "", 1))
    }
}

/// Reverse URL lookup for the page tree that is serving `req`.
///
/// Parameters the current request matched are reused when `args` leave
/// them open.
pub fn url_for(req: &Request, target: impl Into<UrlPattern>, args: &[UrlArg]) -> Result<String> {
    let ctx = req
        .extensions()
        .get::<Arc<BuildContext>>()
        .ok_or_else(|| Error::NotFound("build context not found in request".to_string()))?;
    let params = req.extensions().get::<UrlParams>();
    ctx.tree().url_for(params, &target.into(), args)
}
