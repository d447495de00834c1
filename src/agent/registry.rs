//! Agent registry: loaded agents plus the single active slot.

use crate::agent::events::{AgentEvent, AgentState};
use crate::agent::instance::Agent;
use crate::error::ApiError;
use std::collections::{BTreeMap, HashMap};

/// Registry of loaded agents.
///
/// Invariants: at most one agent holds focus (Active or Stopped), and it is
/// the one named by `active`; `active` always names a loaded agent.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
    active: Option<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly loaded agent. Rejects names that are already loaded.
    pub fn register(&mut self, agent: Agent) -> Result<(), ApiError> {
        if self.agents.contains_key(agent.name()) {
            return Err(ApiError::AlreadyLoaded(agent.name().to_string()));
        }
        self.agents.insert(agent.name().to_string(), agent);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Agent> {
        self.agents.get_mut(name)
    }

    /// Get a loaded agent or return `NotFound`
    pub fn get_or_error(&self, name: &str) -> Result<&Agent, ApiError> {
        self.get(name)
            .ok_or_else(|| ApiError::NotFound(format!("agent {} is not loaded", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&Agent> {
        self.active.as_deref().and_then(|name| self.agents.get(name))
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut Agent> {
        match self.active.as_deref() {
            Some(name) => self.agents.get_mut(name),
            None => None,
        }
    }

    /// Make `name` the active agent, demoting the previous one to Loaded.
    ///
    /// Switching to the agent that already holds focus changes nothing.
    pub(crate) fn set_active(&mut self, name: &str) -> Result<Vec<AgentEvent>, ApiError> {
        if !self.agents.contains_key(name) {
            return Err(ApiError::NotFound(format!("agent {} is not loaded", name)));
        }
        if self.active.as_deref() == Some(name) {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        if let Some(previous) = self.active_mut() {
            events.extend(previous.set_state(AgentState::Loaded));
        }
        if let Some(next) = self.agents.get_mut(name) {
            events.extend(next.set_state(AgentState::Active));
        }
        self.active = Some(name.to_string());
        Ok(events)
    }

    /// Remove an agent, vacating the active slot if it held it.
    pub(crate) fn remove(&mut self, name: &str) -> Option<Agent> {
        let agent = self.agents.remove(name)?;
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        Some(agent)
    }

    pub(crate) fn drain(&mut self) -> Vec<Agent> {
        self.active = None;
        self.agents.drain().map(|(_, agent)| agent).collect()
    }

    /// Loaded agent names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort();
        names
    }

    /// Name -> state for every loaded agent.
    pub fn snapshot(&self) -> BTreeMap<String, AgentState> {
        self.agents
            .iter()
            .map(|(name, agent)| (name.clone(), agent.state()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
