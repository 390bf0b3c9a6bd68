//! Tool registry — an explicit name → callback table.
//!
//! Built at construction time from the callbacks handed in; duplicate
//! names are a configuration error and fail fast, before any request is
//! processed. There is no global registry: each request-building layer
//! owns its own instance.

use std::collections::HashMap;
use std::sync::Arc;

use ferrochat_core::{ToolCallback, ToolDefinition, ToolError};

/// A lookup table over the active tool callbacks.
///
/// Registration order is preserved so the definitions sent to the model
/// are deterministic.
pub struct ToolRegistry {
    callbacks: Vec<Arc<dyn ToolCallback>>,
    by_name: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("callbacks", &self.callbacks.len())
            .field("by_name", &self.by_name)
            .finish()
    }
}

impl ToolRegistry {
    /// Build the table, failing fast on a duplicate name.
    pub fn new(callbacks: &[Arc<dyn ToolCallback>]) -> Result<Self, ToolError> {
        let mut by_name = HashMap::with_capacity(callbacks.len());
        for (i, callback) in callbacks.iter().enumerate() {
            let name = callback.definition().name;
            if by_name.insert(name.clone(), i).is_some() {
                return Err(ToolError::DuplicateName(name));
            }
        }
        Ok(Self {
            callbacks: callbacks.to_vec(),
            by_name,
        })
    }

    /// Look up a callback by tool name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolCallback>> {
        self.by_name.get(name).map(|&i| &self.callbacks[i])
    }

    /// Every tool's definition, in registration order — attached to the
    /// outgoing request so the model can choose to call one or more.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.callbacks.iter().map(|c| c.definition()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferrochat_core::ExecutionContext;

    struct NamedTool(&'static str);

    #[async_trait]
    impl ToolCallback for NamedTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.0.into(),
                description: format!("the {} tool", self.0),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        async fn call(
            &self,
            _arguments: &str,
            _context: &ExecutionContext,
        ) -> Result<String, ToolError> {
            Ok(format!("{} ran", self.0))
        }
    }

    #[test]
    fn registry_builds_and_looks_up() {
        let registry = ToolRegistry::new(&[
            Arc::new(NamedTool("alpha")) as Arc<dyn ToolCallback>,
            Arc::new(NamedTool("beta")),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("gamma").is_none());
    }

    #[test]
    fn duplicate_names_fail_at_construction() {
        let err = ToolRegistry::new(&[
            Arc::new(NamedTool("alpha")) as Arc<dyn ToolCallback>,
            Arc::new(NamedTool("alpha")),
        ])
        .unwrap_err();

        assert!(matches!(err, ToolError::DuplicateName(name) if name == "alpha"));
    }

    #[test]
    fn definitions_keep_registration_order() {
        let registry = ToolRegistry::new(&[
            Arc::new(NamedTool("zeta")) as Arc<dyn ToolCallback>,
            Arc::new(NamedTool("alpha")),
        ])
        .unwrap();

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn empty_registry_is_fine() {
        let registry = ToolRegistry::new(&[]).unwrap();
        assert!(registry.is_empty());
        assert!(registry.definitions().is_empty());
    }
}
