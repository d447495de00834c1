//! Agent manifest validation owned by the agent domain.

use super::manifest::AgentManifest;
use std::collections::HashSet;

/// Agent and tool names: ASCII alphanumerics, `-` and `_`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validate an agent manifest.
pub fn validate_manifest(manifest: &AgentManifest) -> Result<(), String> {
    if manifest.name.trim().is_empty() {
        return Err("Agent name cannot be empty".to_string());
    }

    if !is_valid_name(&manifest.name) {
        return Err(format!(
            "Agent name '{}' may only contain letters, digits, '-' and '_'",
            manifest.name
        ));
    }

    if let Some(ref prompt) = manifest.system_prompt {
        if prompt.trim().is_empty() {
            return Err("System prompt cannot be empty if provided".to_string());
        }
    }

    let mut seen = HashSet::new();
    for tool in &manifest.tools {
        if !is_valid_name(tool) {
            return Err(format!(
                "Agent '{}' lists invalid tool name '{}'",
                manifest.name, tool
            ));
        }
        if !seen.insert(tool.as_str()) {
            return Err(format!(
                "Agent '{}' lists tool '{}' more than once",
                manifest.name, tool
            ));
        }
    }

    Ok(())
}
