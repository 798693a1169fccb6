//! Configuration sources, lowest precedence first.
//!
//! - user file: `$XDG_CONFIG_HOME/iotdb-recipes/config.toml`
//!   (or `~/.config/iotdb-recipes/config.toml`)
//! - root files: `config/recipes.toml`, then `config/recipes.{IOTDB_RECIPES_ENV}.toml`
//! - environment: `IOTDB_RECIPES__SECTION__KEY`

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "IOTDB_RECIPES";

/// Selects the environment-specific root file
pub const ENV_NAME_VAR: &str = "IOTDB_RECIPES_ENV";

/// Path to the user-level config file.
pub fn user_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
        })?;
    Some(base.join("iotdb-recipes").join("config.toml"))
}

/// Add the user-level config file if it exists.
pub fn add_user_file(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match user_config_path() {
        Some(path) if path.exists() => {
            debug!(config_path = %path.display(), "Using user configuration");
            add_file(builder, &path)
        }
        _ => builder,
    }
}

/// Add `config/recipes.toml` and the environment-specific file under `root`.
pub fn add_root_files(
    builder: ConfigBuilder<DefaultState>,
    root: &Path,
) -> ConfigBuilder<DefaultState> {
    let config_dir = root.join("config");
    let mut builder = builder;

    let base_path = config_dir.join("recipes.toml");
    if base_path.exists() {
        builder = add_file(builder, &base_path);
    }

    if let Ok(env_name) = std::env::var(ENV_NAME_VAR) {
        let env_path = config_dir.join(format!("recipes.{}.toml", env_name));
        if env_path.exists() {
            builder = add_file(builder, &env_path);
        }
    }

    builder
}

/// Add one required file source.
pub fn add_file(builder: ConfigBuilder<DefaultState>, path: &Path) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path).required(true))
}

/// Add `IOTDB_RECIPES__*` environment overrides.
pub fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
