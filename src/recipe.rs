//! Recipes
//!
//! A recipe is a named automation rule bound to IoT things. Users author a
//! `RecipeDefinition`; the normalizer turns it into a `Recipe`, which owns the
//! recipe's runtime `Context`.

pub mod definition;
pub mod id;
pub mod normalize;
pub mod projection;
pub mod vocab;

pub use definition::{
    ClickCallback, ContextCallback, RecipeDefinition, WatchCallback, Watchable,
};
pub use id::{RecipeId, RECIPE_URN_PREFIX};
pub use normalize::Normalizer;
pub use vocab::ValueMetadata;

use crate::config::ContextConfig;
use crate::context::Context;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A normalized recipe
pub struct Recipe {
    id: RecipeId,
    name: String,
    group: String,
    group_id: Option<String>,
    cookbook_id: Option<String>,
    enabled: bool,
    metadata: ValueMetadata,
    values: Option<BTreeMap<String, Value>>,
    state: Map<String, Value>,
    onclick: Option<ClickCallback>,
    onvalidate: Option<ContextCallback>,
    context_config: ContextConfig,
    context: OnceLock<Arc<Context>>,
}

impl Recipe {
    pub fn id(&self) -> &RecipeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn cookbook_id(&self) -> Option<&str> {
        self.cookbook_id.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn metadata(&self) -> &ValueMetadata {
        &self.metadata
    }

    pub fn values(&self) -> Option<&BTreeMap<String, Value>> {
        self.values.as_ref()
    }

    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    pub fn onclick(&self) -> Option<&ClickCallback> {
        self.onclick.as_ref()
    }

    pub fn onvalidate(&self) -> Option<&ContextCallback> {
        self.onvalidate.as_ref()
    }

    /// The recipe's runtime context, created on first use
    pub fn context(self: &Arc<Self>) -> Arc<Context> {
        self.context
            .get_or_init(|| {
                Arc::new(Context::new(
                    Arc::downgrade(self),
                    self.id.clone(),
                    &self.context_config,
                ))
            })
            .clone()
    }

    /// Whether the context has been created yet
    pub fn has_context(&self) -> bool {
        self.context.get().is_some()
    }
}

/// Canonical ordering of recipes: by group, then by name
pub fn order_recipe(a: &Recipe, b: &Recipe) -> Ordering {
    a.group
        .cmp(&b.group)
        .then_with(|| a.name.cmp(&b.name))
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("id", &self.id)
            .field("group", &self.group)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
