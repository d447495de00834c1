//! Agent lifecycle
//!
//! Discoverable agent modules, the registry of loaded agents with a single
//! active slot, and the controller that moves agents between states.

pub mod builtins;
pub mod commands;
pub mod domain;
pub mod events;
mod instance;
pub mod manager;
pub mod memory;
mod registry;
pub mod repository;
pub mod session;
pub mod tools;

pub use commands::AgentCommandService;
pub use domain::AgentManifest;
pub use events::{AgentEvent, AgentState, Listener};
pub use instance::Agent;
pub use manager::{AgentManager, ForgetResult, LoadableAgents, StopOutcome};
pub use memory::{AgentMemory, MessageRole};
pub use registry::AgentRegistry;
pub use repository::{DirectoryDiscovery, ModuleDiscovery, StaticDiscovery};
pub use session::{AgentTask, IdleTask, SessionExit, StopSignal, TaskContext};
pub use tools::AttachedTools;
