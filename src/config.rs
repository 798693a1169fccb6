//! Configuration System
//!
//! Layered configuration for the registry, contexts and transport. Sources are
//! merged in order: built-in defaults, the user file, files under a root
//! directory (or one explicit file), then `IOTDB_RECIPES__*` environment
//! variables.

use crate::error::RecipeError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod merge;
mod sources;

pub use sources::{user_config_path, ENV_NAME_VAR, ENV_PREFIX};

/// Cookbook name used when nothing else is configured
pub const DEFAULT_GROUP: &str = "My Cookbook";

pub const DEFAULT_DONE_TIMEOUT_MS: u64 = 800;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

const MAX_DONE_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipesConfig {
    #[serde(default)]
    pub cookbook: CookbookConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cookbook attribution defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookbookConfig {
    /// Group given to recipes registered outside any cookbook
    #[serde(default = "default_group")]
    pub default_group: String,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

impl Default for CookbookConfig {
    fn default() -> Self {
        Self {
            default_group: default_group(),
        }
    }
}

/// Per-recipe runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Delay before `done()` marks a recipe idle
    #[serde(default = "default_done_timeout_ms")]
    pub done_timeout_ms: u64,

    /// Buffered status notifications per context before slow subscribers lag
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_done_timeout_ms() -> u64 {
    DEFAULT_DONE_TIMEOUT_MS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl ContextConfig {
    pub fn done_timeout(&self) -> Duration {
        Duration::from_millis(self.done_timeout_ms)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            done_timeout_ms: default_done_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Transport adapter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    /// User attached to requests that do not name one
    #[serde(default)]
    pub user: Option<String>,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Cookbook(String),
    Context(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Cookbook(msg) => write!(f, "Cookbook: {}", msg),
            ValidationError::Context(msg) => write!(f, "Context: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RecipesConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.cookbook.default_group.trim().is_empty() {
            errors.push(ValidationError::Cookbook(
                "default_group cannot be empty".to_string(),
            ));
        }

        if self.context.channel_capacity == 0 {
            errors.push(ValidationError::Context(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.context.done_timeout_ms == 0 || self.context.done_timeout_ms > MAX_DONE_TIMEOUT_MS {
            errors.push(ValidationError::Context(format!(
                "done_timeout_ms must be between 1 and {}",
                MAX_DONE_TIMEOUT_MS
            )));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads `RecipesConfig` from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a root directory
    ///
    /// Missing files are skipped; malformed files are errors.
    pub fn load(root: &Path) -> Result<RecipesConfig, RecipeError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::add_user_file(builder);
        let builder = sources::add_root_files(builder, root);
        let builder = sources::add_environment(builder);

        Self::finish(builder)
    }

    /// Load configuration from one explicit file (plus defaults and environment)
    pub fn load_from_file(path: &Path) -> Result<RecipesConfig, RecipeError> {
        if !path.exists() {
            return Err(RecipeError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let builder = merge::builder_with_defaults()?;
        let builder = sources::add_file(builder, path);
        let builder = sources::add_environment(builder);

        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<RecipesConfig, RecipeError> {
        let config: RecipesConfig = builder.build()?.try_deserialize()?;

        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            RecipeError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;

        Ok(config)
    }
}
