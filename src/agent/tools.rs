//! Ordered set of tool names attached to an agent.

use crate::agent::domain::validation::is_valid_name;
use crate::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachedTools {
    names: Vec<String>,
}

impl AttachedTools {
    /// Build from a list, dropping later duplicates.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tools = Self::default();
        for name in names {
            tools.attach(name);
        }
        tools
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Append a tool. Returns false if it was already attached.
    pub fn attach(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    /// Rename in place, keeping the tool's position.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), ApiError> {
        let position = self
            .names
            .iter()
            .position(|n| n == old)
            .ok_or_else(|| ApiError::ToolNotFound(old.to_string()))?;

        if old == new {
            return Ok(());
        }
        if !is_valid_name(new) {
            return Err(ApiError::InvalidArgument(format!(
                "Invalid tool name '{}'",
                new
            )));
        }
        if self.contains(new) {
            return Err(ApiError::InvalidArgument(format!(
                "Tool '{}' is already attached",
                new
            )));
        }

        self.names[position] = new.to_string();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
