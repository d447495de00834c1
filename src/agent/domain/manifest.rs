//! Agent manifest: the discoverable description of an agent module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Agent manifest owned by the agent domain.
///
/// Stored as TOML under `$XDG_CONFIG_HOME/steward/agents/`:
///
/// ```toml
/// name = "research"
/// description = "Searches and summarizes sources"
/// system_prompt = "You are a careful research assistant."
/// tools = ["web_search", "read_file"]
///
/// [metadata]
/// temperature = "0.2"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentManifest {
    /// Agent name, unique among discoverable modules. Derived from the file name when empty.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Tools attached when the agent is loaded, in order.
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl AgentManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            system_prompt: None,
            tools: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }
}
