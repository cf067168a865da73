use serde::Serialize;
use tracing::info;

use super::Router;
use crate::error::Result;
use crate::page::join_path;
use crate::server::Handler;

/// A registration seen by a [`PrintRouter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub method: String,
    pub pattern: String,
}

/// A [`Router`] that serves nothing. It logs every group and registration
/// and keeps the full patterns, which makes it handy for dumping a site map.
#[derive(Debug, Default)]
pub struct PrintRouter {
    prefix: String,
    registrations: Vec<Registration>,
}

impl PrintRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// The registrations as a JSON array of `{"method", "pattern"}` objects.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.registrations)
    }
}

impl Router for PrintRouter {
    fn route(
        &mut self,
        path: &str,
        group: &mut dyn FnMut(&mut dyn Router) -> Result<()>,
    ) -> Result<()> {
        let saved = self.prefix.clone();
        self.prefix = join_path(&saved, path);
        info!(prefix = %self.prefix, "route group");
        let result = group(self);
        self.prefix = saved;
        result
    }

    fn handle_method(&mut self, method: &str, path: &str, _handler: Handler) -> Result<()> {
        let pattern = join_path(&self.prefix, path);
        info!(method = %method, pattern = %pattern, "handle method");
        self.registrations.push(Registration {
            method: method.to_string(),
            pattern,
        });
        Ok(())
    }

    fn atomic(&mut self, batch: &mut dyn FnMut(&mut dyn Router) -> Result<()>) -> Result<()> {
        let mark = self.registrations.len();
        let result = batch(self);
        if result.is_err() {
            self.registrations.truncate(mark);
        }
        result
    }
}
