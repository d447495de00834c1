mod agent_lifecycle;
mod collection_identity;
mod directory_discovery;
mod support;
