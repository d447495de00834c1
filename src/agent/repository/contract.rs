use crate::agent::domain::AgentManifest;
use crate::error::ApiError;

/// Enumerates the agent modules that can be loaded.
pub trait ModuleDiscovery: Send + Sync {
    /// Names of all discoverable modules, sorted.
    fn list_modules(&self) -> Result<Vec<String>, ApiError>;

    /// Manifest for one module, `None` when no module has that name.
    fn manifest(&self, name: &str) -> Result<Option<AgentManifest>, ApiError>;
}
