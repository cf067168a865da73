//! Page trees: the node arena, route metadata and the builder that turns a
//! root page value into a tree.

mod build;
mod descriptor;
mod node;
mod route;

pub(crate) use self::build::TreeBuilder;
pub use self::descriptor::{Descriptor, Page};
pub use self::node::{NodeId, PageNode, PageTree};
pub use self::route::{join_path, RouteSpec, METHOD_ANY};
