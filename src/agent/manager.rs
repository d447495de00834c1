//! Agent lifecycle controller.
//!
//! Every operation that touches the registry or the active slot takes the
//! same mutex, so `load`, `switch`, `stop` and `unload` are serialized. The
//! lock is never held across an `.await`; listeners are invoked after it is
//! released.

use crate::agent::domain::AgentManifest;
use crate::agent::events::{dispatch, AgentEvent, AgentState, Listener};
use crate::agent::instance::Agent;
use crate::agent::registry::AgentRegistry;
use crate::agent::repository::ModuleDiscovery;
use crate::agent::memory::MessageRole;
use crate::agent::session::{AgentTask, Session, SessionExit};
use crate::error::ApiError;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of `stop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    SignalSent { agent: String },
    /// The active agent was already stopped
    NotRunning { agent: String },
}

/// Result of `forget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgetResult {
    pub agent: String,
    pub term: String,
    pub forgotten: bool,
}

/// Lazy, restartable sequence of loadable agent names.
///
/// Discovery runs each time [`LoadableAgents::iter`] is called, never before.
pub struct LoadableAgents {
    discovery: Arc<dyn ModuleDiscovery>,
}

impl LoadableAgents {
    pub fn iter(&self) -> Result<std::vec::IntoIter<String>, ApiError> {
        Ok(self.discovery.list_modules()?.into_iter())
    }
}

pub struct AgentManager {
    discovery: Arc<dyn ModuleDiscovery>,
    registry: Mutex<AgentRegistry>,
    stop_timeout: Duration,
}

impl AgentManager {
    pub fn new(discovery: Arc<dyn ModuleDiscovery>) -> Self {
        Self {
            discovery,
            registry: Mutex::new(AgentRegistry::new()),
            stop_timeout: Duration::from_secs(5),
        }
    }

    /// How long `unload` waits for a session to honor its stop signal.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Load a discoverable agent without activating it.
    pub fn load(&self, name: &str) -> Result<(), ApiError> {
        if self.registry.lock().contains(name) {
            return Err(ApiError::AlreadyLoaded(name.to_string()));
        }

        let manifest = self
            .discovery
            .manifest(name)?
            .ok_or_else(|| ApiError::NotFound(format!("agent module {}", name)))?;

        // A concurrent load of the same name is caught by `register`.
        self.registry
            .lock()
            .register(Agent::from_manifest(manifest))?;
        info!(agent = %name, "Agent loaded");
        Ok(())
    }

    /// Make a loaded agent the active one. The previous agent keeps its session.
    pub fn switch(&self, name: &str) -> Result<(), ApiError> {
        let routed = {
            let mut registry = self.registry.lock();
            let previous = registry.active_name().map(str::to_string);
            let events = registry.set_active(name)?;
            if events.is_empty() {
                debug!(agent = %name, "Switch to active agent is a no-op");
                return Ok(());
            }
            info!(agent = %name, previous = ?previous, "Switched active agent");
            route_events(&registry, events)
        };
        for (listeners, event) in routed {
            dispatch(&listeners, std::slice::from_ref(&event));
        }
        Ok(())
    }

    /// Signal the active agent's session to halt. The agent stays loaded and active.
    pub fn stop(&self) -> Result<StopOutcome, ApiError> {
        let (listeners, event, outcome) = {
            let mut registry = self.registry.lock();
            let agent = registry.active_mut().ok_or(ApiError::NoActiveAgent)?;
            let name = agent.name().to_string();

            if agent.state() == AgentState::Stopped {
                return Ok(StopOutcome::NotRunning { agent: name });
            }

            if let Some(session) = agent.session() {
                let sent = session.request_stop();
                debug!(agent = %name, sent, "Stop signal delivered to session");
            }
            let event = agent.set_state(AgentState::Stopped);
            info!(agent = %name, "Agent stopped");
            (
                agent.listeners().to_vec(),
                event,
                StopOutcome::SignalSent { agent: name },
            )
        };
        dispatch(&listeners, event.as_slice());
        Ok(outcome)
    }

    /// Terminate the active agent's session and remove it from the registry.
    ///
    /// Memory, tools and listeners are released before this returns; the
    /// registry holds no reference to the agent afterwards.
    pub async fn unload(&self) -> Result<String, ApiError> {
        let agent = {
            let mut registry = self.registry.lock();
            let name = registry
                .active_name()
                .map(str::to_string)
                .ok_or(ApiError::NoActiveAgent)?;
            registry
                .remove(&name)
                .ok_or_else(|| ApiError::NotFound(format!("agent {} is not loaded", name)))?
        };

        let name = agent.name().to_string();
        let detached = agent.teardown();
        if let Some(session) = detached.session {
            let exit = session.stop_session(self.stop_timeout).await;
            log_session_exit(&name, &exit);
        }

        dispatch(
            &detached.listeners,
            &[AgentEvent::StateChanged {
                agent: name.clone(),
                from: detached.last_state,
                to: AgentState::Unloaded,
            }],
        );
        info!(agent = %name, "Agent unloaded");
        Ok(name)
    }

    /// Agents that could be loaded, independent of what is loaded now.
    pub fn list_loadable(&self) -> LoadableAgents {
        LoadableAgents {
            discovery: Arc::clone(&self.discovery),
        }
    }

    /// Snapshot of loaded agents and their states.
    pub fn list_loaded(&self) -> BTreeMap<String, AgentState> {
        self.registry.lock().snapshot()
    }

    pub fn active_name(&self) -> Option<String> {
        self.registry.lock().active_name().map(str::to_string)
    }

    /// Loaded agents and the active name, read under one lock.
    pub fn loaded_with_active(&self) -> (BTreeMap<String, AgentState>, Option<String>) {
        let registry = self.registry.lock();
        (
            registry.snapshot(),
            registry.active_name().map(str::to_string),
        )
    }

    /// Lock the registry once the active agent's manifest has been discovered.
    ///
    /// Discovery runs outside the lock. If the active agent changed meanwhile,
    /// discovery runs again for the new one.
    fn lock_with_active_manifest(
        &self,
    ) -> Result<(MutexGuard<'_, AgentRegistry>, Option<AgentManifest>), ApiError> {
        loop {
            let name = self.active_name().ok_or(ApiError::NoActiveAgent)?;
            let manifest = self.discovery.manifest(&name)?;
            let registry = self.registry.lock();
            if registry.active_name() == Some(name.as_str()) {
                return Ok((registry, manifest));
            }
            debug!(agent = %name, "Active agent changed during discovery");
        }
    }

    /// Read access to a loaded agent.
    pub fn with_agent<R>(&self, name: &str, f: impl FnOnce(&Agent) -> R) -> Option<R> {
        self.registry.lock().get(name).map(f)
    }

    /// Read access to the active agent.
    pub fn with_active<R>(&self, f: impl FnOnce(&Agent) -> R) -> Option<R> {
        self.registry.lock().active().map(f)
    }

    /// Rename a tool on the active agent. Does nothing when no agent is active.
    pub fn rename_tool(&self, old: &str, new: &str) -> Result<(), ApiError> {
        let (listeners, event) = {
            let mut registry = self.registry.lock();
            let Some(agent) = registry.active_mut() else {
                debug!("rename_tool ignored: no active agent");
                return Ok(());
            };
            agent.tools_mut().rename(old, new)?;
            let event = AgentEvent::ToolRenamed {
                agent: agent.name().to_string(),
                old: old.to_string(),
                new: new.to_string(),
            };
            (agent.listeners().to_vec(), event)
        };
        dispatch(&listeners, &[event]);
        Ok(())
    }

    /// Tool names attached to the active agent, in order.
    pub fn list_tools(&self) -> Result<Vec<String>, ApiError> {
        self.with_active(|agent| agent.tools().names().to_vec())
            .ok_or(ApiError::NoActiveAgent)
    }

    /// Empty the active agent's memory, then reload its configuration.
    pub fn clear_memory(&self) -> Result<String, ApiError> {
        let (listeners, events, name) = {
            let (mut registry, manifest) = self.lock_with_active_manifest()?;
            let agent = registry.active_mut().ok_or(ApiError::NoActiveAgent)?;
            let name = agent.name().to_string();
            agent.memory_mut().clear();
            let events = vec![
                AgentEvent::MemoryCleared {
                    agent: name.clone(),
                },
                agent.reload(manifest),
            ];
            (agent.listeners().to_vec(), events, name)
        };
        dispatch(&listeners, &events);
        info!(agent = %name, "Cleared agent memory");
        Ok(name)
    }

    /// Forget one term on the active agent, then reload. Reports whether the term was known.
    pub fn forget(&self, term: &str) -> Result<ForgetResult, ApiError> {
        let (listeners, events, result) = {
            let (mut registry, manifest) = self.lock_with_active_manifest()?;
            let agent = registry.active_mut().ok_or(ApiError::NoActiveAgent)?;
            let name = agent.name().to_string();
            let forgotten = agent.memory_mut().forget(term);
            if !forgotten {
                debug!(agent = %name, term, "Term not in memory");
            }
            let mut events = Vec::with_capacity(2);
            if forgotten {
                events.push(AgentEvent::Forgot {
                    agent: name.clone(),
                    term: term.to_string(),
                });
            }
            events.push(agent.reload(manifest));
            let result = ForgetResult {
                agent: name,
                term: term.to_string(),
                forgotten,
            };
            (agent.listeners().to_vec(), events, result)
        };
        dispatch(&listeners, &events);
        Ok(result)
    }

    /// Record a fact about `term` in the active agent's memory.
    pub fn remember(&self, term: &str, fact: &str) -> Result<(), ApiError> {
        if term.trim().is_empty() {
            return Err(ApiError::InvalidArgument("term cannot be empty".to_string()));
        }
        let mut registry = self.registry.lock();
        let agent = registry.active_mut().ok_or(ApiError::NoActiveAgent)?;
        agent.memory_mut().remember(term, fact);
        Ok(())
    }

    /// Attach a listener to a loaded agent.
    pub fn subscribe(&self, name: &str, listener: Listener) -> Result<(), ApiError> {
        let mut registry = self.registry.lock();
        let agent = registry
            .get_mut(name)
            .ok_or_else(|| ApiError::NotFound(format!("agent {} is not loaded", name)))?;
        agent.add_listener(listener);
        Ok(())
    }

    /// Record `message` and start a session for it on the active agent.
    pub async fn send(&self, message: &str, task: Arc<dyn AgentTask>) -> Result<String, ApiError> {
        let (listeners, event, name, previous) = {
            let mut registry = self.registry.lock();
            let agent = registry.active_mut().ok_or(ApiError::NoActiveAgent)?;
            let name = agent.name().to_string();
            if agent.session().map(Session::is_running).unwrap_or(false) {
                return Err(ApiError::AgentBusy(name));
            }

            agent.memory_mut().push(MessageRole::User, message);
            let session = Session::spawn(task, agent.task_context(message));
            let previous = agent.attach_session(session);
            let event = agent.set_state(AgentState::Active);
            info!(agent = %name, "Session started");
            (agent.listeners().to_vec(), event, name, previous)
        };

        if let Some(previous) = previous {
            let exit = previous.stop_session(self.stop_timeout).await;
            log_session_exit(&name, &exit);
        }
        dispatch(&listeners, event.as_slice());
        Ok(name)
    }

    /// Stop every session and drop every agent.
    pub async fn shutdown(&self) {
        let agents = self.registry.lock().drain();
        let timeout = self.stop_timeout;
        let stops = agents.into_iter().filter_map(|agent| {
            let name = agent.name().to_string();
            agent
                .teardown()
                .session
                .map(|session| async move { (name, session.stop_session(timeout).await) })
        });
        for (name, exit) in futures::future::join_all(stops).await {
            log_session_exit(&name, &exit);
        }
    }
}

/// Pair each state change with the listeners of the agent it concerns.
fn route_events(registry: &AgentRegistry, events: Vec<AgentEvent>) -> Vec<(Vec<Listener>, AgentEvent)> {
    events
        .into_iter()
        .filter_map(|event| {
            let AgentEvent::StateChanged { agent, .. } = &event else {
                return None;
            };
            let listeners = registry.get(agent)?.listeners().to_vec();
            Some((listeners, event))
        })
        .collect()
}

fn log_session_exit(agent: &str, exit: &SessionExit) {
    match exit {
        SessionExit::Completed => debug!(agent = %agent, "Session completed"),
        SessionExit::Failed(e) => warn!(agent = %agent, error = %e, "Session ended with error"),
        SessionExit::Aborted => warn!(agent = %agent, "Session ignored stop signal, aborted"),
    }
}
