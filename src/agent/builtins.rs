//! Built-in agent manifests shipped with the application.

use crate::agent::domain::AgentManifest;

/// Built-in manifests. Files in the agents directory override them by name.
pub fn builtin_manifests() -> Vec<AgentManifest> {
    vec![
        AgentManifest::new("chat")
            .with_description("General conversation with short-term memory")
            .with_system_prompt("You are a helpful assistant. Keep answers short."),
        AgentManifest::new("research")
            .with_description("Searches indexed collections and summarizes findings")
            .with_system_prompt(
                "You are a careful research assistant. Cite the collection each fact came from.",
            )
            .with_tools(["search_steward", "read_file", "summarize"]),
    ]
}
