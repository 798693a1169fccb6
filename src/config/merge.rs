//! Merge rules: defaults first, then files, then environment.

use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with every default applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let logging = LoggingConfig::default();

    Config::builder()
        .set_default("cookbook.default_group", super::DEFAULT_GROUP)?
        .set_default("context.done_timeout_ms", super::DEFAULT_DONE_TIMEOUT_MS as i64)?
        .set_default("context.channel_capacity", super::DEFAULT_CHANNEL_CAPACITY as i64)?
        .set_default("logging.level", logging.level)?
        .set_default("logging.format", logging.format)?
        .set_default("logging.output", logging.output)?
        .set_default("logging.color", logging.color)
}
