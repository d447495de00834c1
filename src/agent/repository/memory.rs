use crate::agent::builtins::builtin_manifests;
use crate::agent::domain::AgentManifest;
use crate::agent::repository::ModuleDiscovery;
use crate::error::ApiError;
use std::collections::BTreeMap;

/// Fixed set of manifests held in memory.
pub struct StaticDiscovery {
    manifests: BTreeMap<String, AgentManifest>,
}

impl StaticDiscovery {
    pub fn new(manifests: impl IntoIterator<Item = AgentManifest>) -> Self {
        Self {
            manifests: manifests
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect(),
        }
    }

    /// Only the built-in manifests.
    pub fn builtin() -> Self {
        Self::new(builtin_manifests())
    }
}

impl ModuleDiscovery for StaticDiscovery {
    fn list_modules(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.manifests.keys().cloned().collect())
    }

    fn manifest(&self, name: &str) -> Result<Option<AgentManifest>, ApiError> {
        Ok(self.manifests.get(name).cloned())
    }
}
