//! Merge policy: base builder seeded with defaults every source overlays.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("index.default_collection", super::super::default_collection_name())?
        .set_default("agents.stop_timeout_ms", 5_000_i64)
}
