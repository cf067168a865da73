use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::descriptor::{Descriptor, Page};
use super::node::{NodeId, PageNode, PageTree};
use super::route::{join_path, RouteSpec};
use crate::error::{Error, Result};
use crate::invoke::{short_type_name, Invocation, Receiver};
use crate::registry::TypeRegistry;

/// Builds a [`PageTree`] from a root page value.
///
/// Node ids are reserved in pre-order before the children are built, so the
/// arena ends up ordered node-then-children. A node's `Init` hook runs after
/// its children exist, with the node itself available for injection.
pub(crate) struct TreeBuilder<'r> {
    registry: &'r TypeRegistry,
    nodes: Vec<Option<Arc<PageNode>>>,
    values: Vec<Option<Box<dyn Any + Send + Sync>>>,
}

impl<'r> TreeBuilder<'r> {
    pub(crate) fn build<P: Page>(
        registry: &'r TypeRegistry,
        page: P,
        route_meta: &str,
    ) -> Result<PageTree> {
        let mut builder = TreeBuilder {
            registry,
            nodes: Vec::new(),
            values: Vec::new(),
        };
        builder.build_node(page, None, "", None, route_meta)?;
        builder.finish()
    }

    fn build_node<P: Page>(
        &mut self,
        mut page: P,
        parent: Option<NodeId>,
        parent_route: &str,
        field: Option<String>,
        route_meta: &str,
    ) -> Result<NodeId> {
        let type_name = type_name::<P>();
        let short = short_type_name(type_name);
        let name = field.unwrap_or_else(|| short.to_string());
        let spec = RouteSpec::parse(route_meta).map_err(|e| Error::at_node(&name, e))?;
        let full_route = match parent {
            None => spec.path.clone(),
            Some(_) => join_path(parent_route, &spec.path),
        };

        let id = self.nodes.len();
        self.nodes.push(None);
        self.values.push(None);

        let mut descriptor = Descriptor::<P>::new();
        P::describe(&mut descriptor);
        if let Some(err) = descriptor.errors.drain(..).next() {
            return Err(Error::at_node(&name, err));
        }

        let mut seen = HashSet::new();
        let mut children = Vec::with_capacity(descriptor.children.len());
        for child in &descriptor.children {
            if !seen.insert(child.field.as_str()) {
                return Err(Error::at_node(
                    &name,
                    Error::Parse(format!("duplicate child field {}", child.field)),
                ));
            }
            let child_id = (child.factory)(
                self,
                Some(id),
                &full_route,
                child.field.clone(),
                &child.route,
            )
            .map_err(|e| Error::at_node(&name, e))?;
            children.push(child_id);
        }

        let node = Arc::new(PageNode {
            id,
            name,
            title: spec.title,
            method: spec.method,
            route: spec.path,
            full_route,
            page_type: TypeId::of::<P>(),
            type_name,
            components: descriptor.components,
            props: descriptor.props,
            page_config: descriptor.page_config,
            middlewares: descriptor.middlewares,
            handler: descriptor.handler,
            parent,
            children,
        });

        if let Some(init) = &descriptor.init {
            let mut inv = Invocation::new(
                format!("{}.Init", short),
                Receiver::exclusive(&mut page),
                self.registry,
            )
            .with_node(&node);
            let outcome = init
                .call(&mut inv)
                .and_then(|returned| {
                    returned.strip_error().map_err(|cause| {
                        Error::call(format!("error calling Init method on {}", short), cause)
                    })
                });
            if let Err(err) = outcome {
                return Err(Error::at_node(node.name(), err));
            }
        }

        debug!(
            node = %node.name(),
            page = short,
            route = %node.full_route(),
            children = node.children().len(),
            "page node built"
        );
        self.nodes[id] = Some(node);
        self.values[id] = Some(Box::new(page));
        Ok(id)
    }

    fn finish(self) -> Result<PageTree> {
        let nodes = self
            .nodes
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::Config("page tree left a node unbuilt".to_string()))?;
        let values = self
            .values
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::Config("page tree left a value unbuilt".to_string()))?;
        if nodes.is_empty() {
            return Err(Error::Config("page tree is empty".to_string()));
        }
        Ok(PageTree { nodes, values })
    }
}

/// Child factory stored by [`Descriptor::child`]: builds a fresh
/// `C::default()` under `parent`.
pub(crate) fn build_child<C: Page + Default>(
    builder: &mut TreeBuilder<'_>,
    parent: Option<NodeId>,
    parent_route: &str,
    field: String,
    route_meta: &str,
) -> Result<NodeId> {
    builder.build_node(C::default(), parent, parent_route, Some(field), route_meta)
}
