//! Agent command service: single entry point per agent CLI command variant.
//!
//! Owns all agent workflow logic; CLI parses, calls one method per variant, and formats output.

use crate::agent::events::AgentState;
use crate::agent::manager::{AgentManager, StopOutcome};
pub use crate::agent::manager::ForgetResult;
use crate::agent::session::AgentTask;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct AgentCommandService;

/// Result of agent list-active command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedAgentEntry {
    pub name: String,
    pub state: AgentState,
    pub active: bool,
}

/// Result of agent stop command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopResult {
    Stopping { agent: String },
    NotRunning,
}

impl AgentCommandService {
    pub fn load(manager: &AgentManager, name: &str) -> Result<String, ApiError> {
        manager.load(name)?;
        Ok(name.to_string())
    }

    pub fn switch(manager: &AgentManager, name: &str) -> Result<String, ApiError> {
        manager.switch(name)?;
        Ok(name.to_string())
    }

    /// Stop the active agent. "Nothing active" and "already stopped" are both reported as not running.
    pub fn stop(manager: &AgentManager) -> Result<StopResult, ApiError> {
        match manager.stop() {
            Ok(StopOutcome::SignalSent { agent }) => Ok(StopResult::Stopping { agent }),
            Ok(StopOutcome::NotRunning { .. }) | Err(ApiError::NoActiveAgent) => {
                Ok(StopResult::NotRunning)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn unload(manager: &AgentManager) -> Result<String, ApiError> {
        manager.unload().await
    }

    /// Names of every discoverable agent module.
    pub fn list(manager: &AgentManager) -> Result<Vec<String>, ApiError> {
        Ok(manager.list_loadable().iter()?.collect())
    }

    pub fn list_active(manager: &AgentManager) -> Vec<LoadedAgentEntry> {
        let (loaded, active) = manager.loaded_with_active();
        loaded
            .into_iter()
            .map(|(name, state)| LoadedAgentEntry {
                active: active.as_deref() == Some(name.as_str()),
                name,
                state,
            })
            .collect()
    }

    pub fn rename_tool(manager: &AgentManager, old: &str, new: &str) -> Result<(), ApiError> {
        manager.rename_tool(old, new)
    }

    pub fn list_tools(manager: &AgentManager) -> Result<Vec<String>, ApiError> {
        manager.list_tools()
    }

    pub fn clear_memory(manager: &AgentManager) -> Result<String, ApiError> {
        manager.clear_memory()
    }

    pub fn forget(manager: &AgentManager, term: &str) -> Result<ForgetResult, ApiError> {
        manager.forget(term)
    }

    pub fn remember(manager: &AgentManager, term: &str, fact: &str) -> Result<String, ApiError> {
        manager.remember(term, fact)?;
        Ok(term.to_string())
    }

    pub async fn send(
        manager: &AgentManager,
        message: &str,
        task: Arc<dyn AgentTask>,
    ) -> Result<String, ApiError> {
        manager.send(message, task).await
    }

    /// Format the loadable list the way the shell prints it.
    pub fn format_loadable(names: &[String]) -> String {
        let mut out = String::from("Available Agents:\n");
        for name in names {
            out.push_str("- ");
            out.push_str(name);
            out.push('\n');
        }
        out.push_str("---");
        out
    }
}
