pub mod manifest;
pub mod validation;

pub use manifest::AgentManifest;
pub use validation::validate_manifest;
