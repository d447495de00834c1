//! A loaded agent. Read access is public; every mutation goes through
//! [`AgentManager`](crate::agent::AgentManager).

use crate::agent::domain::AgentManifest;
use crate::agent::events::{AgentEvent, AgentState, Listener};
use crate::agent::memory::AgentMemory;
use crate::agent::session::{Session, TaskContext};
use crate::agent::tools::AttachedTools;
use chrono::{DateTime, Utc};

pub struct Agent {
    name: String,
    manifest: AgentManifest,
    state: AgentState,
    memory: AgentMemory,
    tools: AttachedTools,
    listeners: Vec<Listener>,
    session: Option<Session>,
    loaded_at: DateTime<Utc>,
}

/// Everything an unloaded agent still owned, handed back for teardown.
pub(crate) struct Detached {
    pub(crate) listeners: Vec<Listener>,
    pub(crate) session: Option<Session>,
    pub(crate) last_state: AgentState,
}

impl Agent {
    pub(crate) fn from_manifest(manifest: AgentManifest) -> Self {
        Self {
            name: manifest.name.clone(),
            tools: AttachedTools::new(manifest.tools.iter().cloned()),
            manifest,
            state: AgentState::Loaded,
            memory: AgentMemory::new(),
            listeners: Vec::new(),
            session: None,
            loaded_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manifest(&self) -> &AgentManifest {
        &self.manifest
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn tools(&self) -> &AttachedTools {
        &self.tools
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// A session exists and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.session.as_ref().map(Session::is_running).unwrap_or(false)
    }

    pub(crate) fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub(crate) fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub(crate) fn memory_mut(&mut self) -> &mut AgentMemory {
        &mut self.memory
    }

    pub(crate) fn tools_mut(&mut self) -> &mut AttachedTools {
        &mut self.tools
    }

    pub(crate) fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Replace a finished session with a new one.
    pub(crate) fn attach_session(&mut self, session: Session) -> Option<Session> {
        self.session.replace(session)
    }

    pub(crate) fn task_context(&self, message: &str) -> TaskContext {
        TaskContext {
            agent: self.name.clone(),
            message: message.to_string(),
            system_prompt: self.manifest.system_prompt.clone(),
            tools: self.tools.names().to_vec(),
        }
    }

    /// Move to `to`, returning the transition event if the state changed.
    pub(crate) fn set_state(&mut self, to: AgentState) -> Option<AgentEvent> {
        if self.state == to {
            return None;
        }
        let from = std::mem::replace(&mut self.state, to);
        Some(AgentEvent::StateChanged {
            agent: self.name.clone(),
            from,
            to,
        })
    }

    /// Re-apply configuration from a fresh manifest, keeping identity,
    /// attached tools, memory and state.
    pub(crate) fn reload(&mut self, manifest: Option<AgentManifest>) -> AgentEvent {
        match manifest {
            Some(manifest) if manifest.name == self.name => self.manifest = manifest,
            Some(_) | None => {
                tracing::warn!(
                    agent = %self.name,
                    "Manifest no longer discoverable, keeping current configuration"
                );
            }
        }
        AgentEvent::Reloaded {
            agent: self.name.clone(),
        }
    }

    /// Release memory, tools, listeners and the session.
    pub(crate) fn teardown(mut self) -> Detached {
        let last_state = self.state;
        self.memory.clear();
        self.tools.clear();
        self.state = AgentState::Unloaded;
        Detached {
            listeners: std::mem::take(&mut self.listeners),
            session: self.session.take(),
            last_state,
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("tools", &self.tools)
            .field("listeners", &self.listeners.len())
            .field("running", &self.is_running())
            .finish()
    }
}
