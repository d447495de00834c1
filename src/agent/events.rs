//! Agent lifecycle events and listener callbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Removed from the registry; only ever observed in events
    Unloaded,
    /// Registered, not active
    Loaded,
    /// The registry's active agent
    Active,
    /// Still the active agent, execution halted by `stop`
    Stopped,
}

impl AgentState {
    /// Active or Stopped: holds the registry's active slot.
    pub fn holds_focus(self) -> bool {
        matches!(self, AgentState::Active | AgentState::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::Unloaded => "unloaded",
            AgentState::Loaded => "loaded",
            AgentState::Active => "active",
            AgentState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    StateChanged {
        agent: String,
        from: AgentState,
        to: AgentState,
    },
    ToolRenamed {
        agent: String,
        old: String,
        new: String,
    },
    MemoryCleared {
        agent: String,
    },
    Forgot {
        agent: String,
        term: String,
    },
    Reloaded {
        agent: String,
    },
}

/// Callback attached to one agent. Dropped when the agent is unloaded.
///
/// Listeners run after the registry lock is released, so they may call back
/// into the manager.
pub type Listener = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

pub(crate) fn dispatch(listeners: &[Listener], events: &[AgentEvent]) {
    for event in events {
        for listener in listeners {
            listener(event);
        }
    }
}
