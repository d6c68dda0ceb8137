//! Flat tool registry across every connected backend.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::connection::BackendConnection;
use crate::tools::ToolDescriptor;

/// What to do when two backends expose the same tool name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Last registration wins; the earlier tool is dropped with a warning.
    #[default]
    Overwrite,
    /// Keep the first registration and skip later duplicates.
    Reject,
    /// Expose each tool as `<backend>__<tool>`.
    Namespace,
}

/// Tool name → descriptor mapping plus the backend connections that own them.
///
/// Built once during initialization and read-only for the lifetime of any
/// conversation.
#[derive(Default)]
pub struct ToolRegistry {
    policy: CollisionPolicy,
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    backends: Vec<Arc<BackendConnection>>,
    backend_index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Register a connected backend and merge its tools, tagging each with
    /// the backend name. Returns how many tools were exposed.
    pub fn register_backend(
        &mut self,
        connection: Arc<BackendConnection>,
        tools: Vec<ToolDescriptor>,
    ) -> usize {
        let backend = connection.name().to_string();
        match self.backend_index.get(&backend) {
            Some(&position) => self.backends[position] = connection,
            None => {
                self.backend_index.insert(backend.clone(), self.backends.len());
                self.backends.push(connection);
            }
        }

        tools
            .into_iter()
            .map(|tool| self.register(tool.with_backend(backend.as_str())))
            .filter(|registered| *registered)
            .count()
    }

    /// Insert one descriptor under the active collision policy. Returns
    /// `false` when the descriptor was skipped.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> bool {
        let descriptor = match self.policy {
            CollisionPolicy::Namespace => {
                let exposed = format!("{}__{}", descriptor.backend, descriptor.upstream_name);
                descriptor.with_exposed_name(exposed)
            }
            _ => descriptor,
        };

        if let Some(&position) = self.index.get(&descriptor.name) {
            let existing = &self.tools[position];
            if self.policy == CollisionPolicy::Reject {
                warn!(
                    tool = %descriptor.name,
                    kept = %existing.backend,
                    skipped = %descriptor.backend,
                    "duplicate tool name; keeping first registration"
                );
                return false;
            }
            warn!(
                tool = %descriptor.name,
                replaced = %existing.backend,
                backend = %descriptor.backend,
                "duplicate tool name; last registration wins"
            );
            self.tools.remove(position);
            self.reindex();
        }

        debug!(tool = %descriptor.name, backend = %descriptor.backend, "registered tool");
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        true
    }

    fn reindex(&mut self) {
        self.index = self
            .tools
            .iter()
            .enumerate()
            .map(|(position, tool)| (tool.name.clone(), position))
            .collect();
    }

    /// All descriptors in registration order.
    pub fn all(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    /// Owning connection of the named tool.
    pub fn resolve_backend(&self, tool_name: &str) -> Option<Arc<BackendConnection>> {
        self.find(tool_name)
            .and_then(|tool| self.backend(&tool.backend))
    }

    /// Connection by backend name.
    pub fn backend(&self, name: &str) -> Option<Arc<BackendConnection>> {
        self.backend_index
            .get(name)
            .map(|&position| Arc::clone(&self.backends[position]))
    }

    pub fn backends(&self) -> &[Arc<BackendConnection>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Empty the registry, handing back the connections so the caller can
    /// close them.
    pub fn clear(&mut self) -> Vec<Arc<BackendConnection>> {
        self.tools.clear();
        self.index.clear();
        self.backend_index.clear();
        std::mem::take(&mut self.backends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{InvocationSpec, ParameterSchema};
    use pretty_assertions::assert_eq;

    fn tool(name: &str, backend: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, format!("{name} from {backend}"), InvocationSpec::Native, ParameterSchema::empty())
            .with_backend(backend)
    }

    fn names(registry: &ToolRegistry) -> Vec<&str> {
        registry.all().iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn overwrite_keeps_last_registration() {
        let mut registry = ToolRegistry::new(CollisionPolicy::Overwrite);
        assert!(registry.register(tool("search", "alpha")));
        assert!(registry.register(tool("fetch", "alpha")));
        assert!(registry.register(tool("search", "beta")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find("search").unwrap().backend, "beta");
        assert_eq!(names(&registry), vec!["fetch", "search"]);
    }

    #[test]
    fn reject_keeps_first_registration() {
        let mut registry = ToolRegistry::new(CollisionPolicy::Reject);
        assert!(registry.register(tool("search", "alpha")));
        assert!(!registry.register(tool("search", "beta")));
        assert_eq!(registry.find("search").unwrap().backend, "alpha");
    }

    #[test]
    fn namespace_exposes_both() {
        let mut registry = ToolRegistry::new(CollisionPolicy::Namespace);
        registry.register(tool("search", "alpha"));
        registry.register(tool("search", "beta"));

        assert_eq!(names(&registry), vec!["alpha__search", "beta__search"]);
        let beta = registry.find("beta__search").unwrap();
        assert_eq!(beta.upstream_name, "search");
        assert!(registry.find("search").is_none());
    }

    #[test]
    fn unknown_tool_and_backend_resolve_to_none() {
        let mut registry = ToolRegistry::default();
        registry.register(tool("search", "ghost"));
        assert!(registry.find("missing").is_none());
        assert!(registry.resolve_backend("missing").is_none());
        // Tool is known but its backend never registered.
        assert!(registry.resolve_backend("search").is_none());
    }

    #[test]
    fn clear_empties_everything() {
        let mut registry = ToolRegistry::default();
        registry.register(tool("search", "alpha"));
        assert!(registry.clear().is_empty());
        assert!(registry.is_empty());
        assert!(registry.clear().is_empty());
        assert!(registry.find("search").is_none());
    }
}
