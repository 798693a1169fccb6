//! Recipe registry: in-memory aggregate of loaded recipes.

use crate::config::RecipesConfig;
use crate::error::RecipeError;
use crate::recipe::{order_recipe, Normalizer, Recipe, RecipeDefinition};
use crate::store::{CategoryStore, Record};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Category key recipes are stored under
pub const RECIPE_CATEGORY: &str = "recipe";

pub use crate::config::DEFAULT_GROUP;

/// Registry shared between the application and the transport
pub type SharedRegistry = Arc<RwLock<Registry>>;

impl Record for Recipe {
    fn record_id(&self) -> Option<&str> {
        Some(self.id().as_str())
    }
}

/// Recipe registry
///
/// Holds every registered recipe, including disabled ones. Lookups and
/// listings only ever see enabled recipes.
pub struct Registry {
    store: CategoryStore<Arc<Recipe>>,
    normalizer: Normalizer,
    default_group: String,
    cookbook_name: String,
    cookbook_id: Option<String>,
}

impl Registry {
    /// Create an empty registry with default settings
    pub fn new() -> Self {
        Self::with_parts(Normalizer::default(), DEFAULT_GROUP.to_string())
    }

    /// Create an empty registry from configuration
    pub fn from_config(config: &RecipesConfig) -> Self {
        Self::with_parts(
            Normalizer::new(config.context.clone()),
            config.cookbook.default_group.clone(),
        )
    }

    fn with_parts(normalizer: Normalizer, default_group: String) -> Self {
        Self {
            store: CategoryStore::new(),
            normalizer,
            cookbook_name: default_group.clone(),
            default_group,
            cookbook_id: None,
        }
    }

    /// Wrap the registry for sharing with a transport
    pub fn shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Switch the current cookbook
    ///
    /// Recipes registered afterwards without a group join this cookbook.
    /// Without a name the default cookbook is restored; a cookbook id, once
    /// set, sticks until replaced.
    pub fn cookbook(&mut self, name: Option<&str>, cookbook_id: Option<&str>) {
        self.cookbook_name = name
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_group.clone());

        if let Some(cookbook_id) = cookbook_id.filter(|c| !c.is_empty()) {
            self.cookbook_id = Some(cookbook_id.to_string());
        }
    }

    /// Normalize and store a definition, replacing a recipe with the same id
    pub fn register(&mut self, mut definition: RecipeDefinition) -> Result<Arc<Recipe>, RecipeError> {
        if definition.group.as_deref().map_or(true, str::is_empty) {
            definition.group = Some(self.cookbook_name.clone());
        }
        if definition.cookbook_id.is_none() {
            definition.cookbook_id = self.cookbook_id.clone();
        }

        let recipe = self.normalizer.normalize(definition)?;
        self.store.upsert(RECIPE_CATEGORY, recipe.clone());
        Ok(recipe)
    }

    /// Register many definitions, skipping (and logging) malformed ones
    ///
    /// Returns the number of recipes registered.
    pub fn load<I>(&mut self, definitions: I) -> usize
    where
        I: IntoIterator<Item = RecipeDefinition>,
    {
        let mut loaded = 0;
        for definition in definitions {
            let name = definition.name.clone();
            match self.register(definition) {
                Ok(_) => loaded += 1,
                Err(e) => error!(recipe = %name, error = %e, "Skipping recipe"),
            }
        }
        info!(loaded, total = self.all().len(), "Loaded recipes");
        loaded
    }

    /// Every stored recipe, including disabled ones, in storage order
    pub fn all(&self) -> &[Arc<Recipe>] {
        self.store.get(RECIPE_CATEGORY)
    }

    /// Enabled recipes in canonical (group, name) order
    pub fn recipes(&self) -> Vec<Arc<Recipe>> {
        let mut recipes: Vec<Arc<Recipe>> = self
            .all()
            .iter()
            .filter(|recipe| recipe.is_enabled())
            .cloned()
            .collect();
        recipes.sort_by(|a, b| order_recipe(a, b));
        recipes
    }

    /// First enabled recipe with the given id
    pub fn find_by_id(&self, id: &str) -> Option<Arc<Recipe>> {
        self.all()
            .iter()
            .filter(|recipe| recipe.is_enabled())
            .find(|recipe| recipe.id().as_str() == id)
            .cloned()
    }

    /// Enabled recipes partitioned by group, each group in canonical order
    pub fn group_recipes(&self) -> BTreeMap<String, Vec<Arc<Recipe>>> {
        let mut groups: BTreeMap<String, Vec<Arc<Recipe>>> = BTreeMap::new();
        for recipe in self.recipes() {
            groups
                .entry(recipe.group().to_string())
                .or_default()
                .push(recipe);
        }
        groups
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
