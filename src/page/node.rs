use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::route::join_path;
use crate::invoke::MethodRef;

/// Index of a node in its [`PageTree`].
pub type NodeId = usize;

/// One routable unit of a page tree.
///
/// Built once at mount time and immutable afterwards. The page instance the
/// capability methods run against lives in the tree (see [`PageTree::value`]).
#[derive(Clone)]
pub struct PageNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) title: String,
    pub(crate) method: String,
    pub(crate) route: String,
    pub(crate) full_route: String,
    pub(crate) page_type: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) components: Vec<(String, MethodRef)>,
    pub(crate) props: Vec<(String, MethodRef)>,
    pub(crate) page_config: Option<MethodRef>,
    pub(crate) middlewares: Option<MethodRef>,
    pub(crate) handler: Option<MethodRef>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl PageNode {
    /// A childless node with no capabilities, outside any tree.
    #[cfg(test)]
    pub(crate) fn detached(name: &str, route: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            title: String::new(),
            method: super::route::METHOD_ANY.to_string(),
            route: route.to_string(),
            full_route: route.to_string(),
            page_type: TypeId::of::<()>(),
            type_name: "()",
            components: Vec::new(),
            props: Vec::new(),
            page_config: None,
            middlewares: None,
            handler: None,
            parent: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Field name the node was declared under, or the type name for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Upper-case HTTP method, `ANY` when unrestricted.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Route pattern relative to the parent.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Route pattern joined with every ancestor's route.
    #[must_use]
    pub fn full_route(&self) -> &str {
        &self.full_route
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the node's page is of type `P`.
    #[must_use]
    pub fn is_page<P: Any>(&self) -> bool {
        self.page_type == TypeId::of::<P>()
    }

    pub(crate) fn page_type(&self) -> TypeId {
        self.page_type
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn component(&self, name: &str) -> Option<&MethodRef> {
        self.components
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn props(&self, name: &str) -> Option<&MethodRef> {
        self.props.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    #[must_use]
    pub fn has_page_config(&self) -> bool {
        self.page_config.is_some()
    }

    #[must_use]
    pub fn has_middlewares(&self) -> bool {
        self.middlewares.is_some()
    }
}

fn fmt_method(method: Option<&MethodRef>) -> String {
    method.map_or_else(|| "<nil>".to_string(), ToString::to_string)
}

impl fmt::Display for PageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PageItem{{name: {}, title: {}, route: {}, middlewares: {}",
            self.name,
            self.title,
            self.route,
            fmt_method(self.middlewares.as_ref())
        )?;
        for (name, method) in &self.components {
            write!(f, ", component: {} -> {}", name, method)?;
        }
        for (name, method) in &self.props {
            write!(f, ", props: {} -> {}", name, method)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for PageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("method", &self.method)
            .field("full_route", &self.full_route)
            .field("type_name", &self.type_name)
            .field("children", &self.children)
            .finish()
    }
}

/// Arena of page nodes addressed by [`NodeId`]; the root is node `0`.
///
/// Nodes are stored in pre-order: a node precedes its children and children
/// keep declaration order.
pub struct PageTree {
    pub(crate) nodes: Vec<Arc<PageNode>>,
    pub(crate) values: Vec<Box<dyn Any + Send + Sync>>,
}

impl PageTree {
    #[must_use]
    pub fn root(&self) -> &Arc<PageNode> {
        &self.nodes[0]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Arc<PageNode>> {
        self.nodes.get(id)
    }

    /// The page instance owned by node `id`.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<&(dyn Any + Send + Sync)> {
        self.values.get(id).map(|v| &**v)
    }

    /// The page instance owned by node `id`, if it is a `P`.
    #[must_use]
    pub fn value_as<P: Any>(&self, id: NodeId) -> Option<&P> {
        self.value(id).and_then(|v| v.downcast_ref::<P>())
    }

    /// Pre-order traversal: node, then its children in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PageNode>> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node in pre-order satisfying `pred`.
    pub fn find(&self, mut pred: impl FnMut(&PageNode) -> bool) -> Option<&Arc<PageNode>> {
        self.nodes.iter().find(|n| pred(n))
    }

    /// Recompute the full route of `id` by walking parent links.
    #[must_use]
    pub fn full_route(&self, id: NodeId) -> Option<String> {
        let node = self.node(id)?;
        match node.parent {
            None => Some(node.route.clone()),
            Some(parent) => Some(join_path(&self.full_route(parent)?, &node.route)),
        }
    }
}

impl fmt::Debug for PageTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter()).finish()
    }
}
