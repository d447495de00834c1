use crate::agent::builtins::builtin_manifests;
use crate::agent::domain::{validate_manifest, AgentManifest};
use crate::agent::repository::ModuleDiscovery;
use crate::error::ApiError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory-backed discovery: built-ins overlaid by manifests on disk.
///
/// Accepts `<dir>/<name>.toml` and `<dir>/<name>/agent.toml`.
pub struct DirectoryDiscovery {
    dir: PathBuf,
    include_builtins: bool,
}

impl DirectoryDiscovery {
    /// Discovery over `$XDG_CONFIG_HOME/steward/agents/`
    pub fn new() -> Result<Self, ApiError> {
        Ok(Self::with_dir(crate::config::xdg::agents_dir()?))
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            include_builtins: true,
        }
    }

    pub fn without_builtins(mut self) -> Self {
        self.include_builtins = false;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scan(&self) -> Result<BTreeMap<String, AgentManifest>, ApiError> {
        let mut manifests = BTreeMap::new();
        if self.include_builtins {
            for manifest in builtin_manifests() {
                manifests.insert(manifest.name.clone(), manifest);
            }
        }

        if !self.dir.exists() {
            return Ok(manifests);
        }

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(2)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(
                        "Failed to read directory entry in {}: {}",
                        self.dir.display(),
                        e
                    );
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(module_name) = module_name_for(path, entry.depth()) else {
                continue;
            };

            if let Some(manifest) = read_manifest(path, &module_name) {
                manifests.insert(manifest.name.clone(), manifest);
            }
        }

        Ok(manifests)
    }
}

/// Module name implied by a manifest path, `None` for files that are not manifests.
fn module_name_for(path: &Path, depth: usize) -> Option<String> {
    if path.extension() != Some(std::ffi::OsStr::new("toml")) {
        return None;
    }
    let name = match depth {
        1 => path.file_stem().and_then(|s| s.to_str()),
        2 if path.file_name() == Some(std::ffi::OsStr::new("agent.toml")) => path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str()),
        _ => None,
    };
    match name {
        Some(name) => Some(name.to_string()),
        None => {
            if depth == 1 {
                tracing::warn!("Invalid agent manifest filename non UTF8: {:?}", path);
            }
            None
        }
    }
}

fn read_manifest(path: &Path, module_name: &str) -> Option<AgentManifest> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to read agent manifest {}: {}", path.display(), e);
            return None;
        }
    };

    let mut manifest: AgentManifest = match toml::from_str(&content) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("Failed to parse agent manifest {}: {}", path.display(), e);
            return None;
        }
    };

    if manifest.name.is_empty() {
        manifest.name = module_name.to_string();
    } else if manifest.name != module_name {
        tracing::warn!(
            "Agent name mismatch in {}: filename={}, manifest={}",
            path.display(),
            module_name,
            manifest.name
        );
        manifest.name = module_name.to_string();
    }

    if let Err(e) = validate_manifest(&manifest) {
        tracing::error!("Invalid agent manifest {}: {}", path.display(), e);
        return None;
    }

    Some(manifest)
}

impl ModuleDiscovery for DirectoryDiscovery {
    fn list_modules(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.scan()?.into_keys().collect())
    }

    fn manifest(&self, name: &str) -> Result<Option<AgentManifest>, ApiError> {
        Ok(self.scan()?.remove(name))
    }
}
