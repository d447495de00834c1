//! Tooling & Integration Layer
//!
//! Command-line surface over the agent manager and the collection index.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
