//! Integration tests for layered configuration loading

use super::test_utils::with_env;
use iotdb_recipes::config::{ConfigLoader, ENV_NAME_VAR};
use iotdb_recipes::{RecipeDefinition, RecipeTransport, Registry};
use tempfile::TempDir;

const DONE_VAR: &str = "IOTDB_RECIPES__CONTEXT__DONE_TIMEOUT_MS";
const USER_VAR: &str = "IOTDB_RECIPES__TRANSPORT__USER";

fn write_root_config(root: &std::path::Path, name: &str, contents: &str) {
    let config_dir = root.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join(name), contents).unwrap();
}

#[test]
fn test_defaults_without_any_files() {
    let temp_dir = TempDir::new().unwrap();
    let xdg = temp_dir.path().join("xdg");
    let xdg = xdg.to_str().unwrap();

    let config = with_env(
        &[
            ("XDG_CONFIG_HOME", Some(xdg)),
            (ENV_NAME_VAR, None),
            (DONE_VAR, None),
            (USER_VAR, None),
        ],
        || ConfigLoader::load(temp_dir.path()).unwrap(),
    );

    assert_eq!(config.cookbook.default_group, "My Cookbook");
    assert_eq!(config.context.done_timeout_ms, 800);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_layers_override_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("home-automation");
    let xdg_root = temp_dir.path().join("xdg");

    std::fs::create_dir_all(xdg_root.join("iotdb-recipes")).unwrap();
    std::fs::write(
        xdg_root.join("iotdb-recipes").join("config.toml"),
        "[cookbook]\ndefault_group = \"User Cookbook\"\n\n[context]\nchannel_capacity = 8\n",
    )
    .unwrap();
    write_root_config(
        &root,
        "recipes.toml",
        "[cookbook]\ndefault_group = \"House\"\n\n[context]\ndone_timeout_ms = 500\n",
    );
    write_root_config(
        &root,
        "recipes.staging.toml",
        "[context]\ndone_timeout_ms = 600\n",
    );

    let config = with_env(
        &[
            ("XDG_CONFIG_HOME", Some(xdg_root.to_str().unwrap())),
            (ENV_NAME_VAR, Some("staging")),
            (DONE_VAR, None),
            (USER_VAR, Some("carol")),
        ],
        || ConfigLoader::load(&root).unwrap(),
    );

    assert_eq!(config.context.channel_capacity, 8);
    assert_eq!(config.cookbook.default_group, "House");
    assert_eq!(config.context.done_timeout_ms, 600);
    assert_eq!(config.transport.user.as_deref(), Some("carol"));
}

#[test]
fn test_environment_beats_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("custom.toml");
    std::fs::write(&config_file, "[context]\ndone_timeout_ms = 500\n").unwrap();

    let config = with_env(&[(DONE_VAR, Some("1500")), (USER_VAR, None)], || {
        ConfigLoader::load_from_file(&config_file).unwrap()
    });

    assert_eq!(config.context.done_timeout_ms, 1500);
}

#[test]
fn test_malformed_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("broken.toml");
    std::fs::write(&config_file, "[context\ndone_timeout_ms = ").unwrap();

    let result = with_env(&[(DONE_VAR, None), (USER_VAR, None)], || {
        ConfigLoader::load_from_file(&config_file)
    });
    assert!(result.is_err());
}

#[tokio::test]
async fn test_configured_registry_and_transport() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("recipes.toml");
    std::fs::write(
        &config_file,
        "[cookbook]\ndefault_group = \"Cabin\"\n\n[transport]\nuser = \"dave\"\n",
    )
    .unwrap();

    let config = with_env(&[(DONE_VAR, None), (USER_VAR, None)], || {
        ConfigLoader::load_from_file(&config_file).unwrap()
    });

    let registry = Registry::from_config(&config).shared();
    let recipe = registry
        .write()
        .register(RecipeDefinition::new("Stove"))
        .unwrap();
    assert_eq!(recipe.group(), "Cabin");

    let transport = RecipeTransport::from_config(registry, &config.transport);
    let meta = transport
        .get(
            iotdb_recipes::Envelope::new()
                .with_id(recipe.id().as_str())
                .with_band("meta"),
        )
        .await
        .unwrap();
    assert_eq!(meta.user.as_deref(), Some("dave"));
}
