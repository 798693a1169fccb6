//! Recipe normalization
//!
//! Turns a raw `RecipeDefinition` into a `Recipe`. Normalization consumes the
//! definition, so it can only ever happen once per definition.

use crate::config::ContextConfig;
use crate::context::{Context, StateUpdate};
use crate::error::RecipeError;
use crate::recipe::definition::{ContextCallback, RecipeDefinition, WatchCallback, Watchable};
use crate::recipe::id::RecipeId;
use crate::recipe::vocab::{RawMetadata, ValueMetadata};
use crate::recipe::Recipe;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Status text shown while some watched things are unreachable
pub const UNREACHABLE_TEXT: &str = "Some Things have not been found (yet)";

/// Builds recipes from definitions
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    context_config: ContextConfig,
}

impl Normalizer {
    pub fn new(context_config: ContextConfig) -> Self {
        Self { context_config }
    }

    /// Normalize a definition
    ///
    /// Disabled definitions become inert recipes: they get an id and identity
    /// but no context, and none of their callbacks run.
    pub fn normalize(&self, definition: RecipeDefinition) -> Result<Arc<Recipe>, RecipeError> {
        if definition.name.trim().is_empty() {
            return Err(RecipeError::InvalidDefinition(
                "recipe has no name".to_string(),
            ));
        }

        let name = definition.name.clone();
        let group = definition.group.clone().unwrap_or_default();
        let group_id = definition.group_id.clone().filter(|g| !g.is_empty());
        let id = RecipeId::derive(group_id.as_deref(), &group, &name);
        let enabled = definition.enabled != Some(false);

        let metadata = ValueMetadata::lift(RawMetadata {
            value: definition.value.as_ref(),
            value_type: definition.value_type.as_ref(),
            format: definition.format.as_ref(),
            unit: definition.unit.as_ref(),
            purpose: definition.purpose.as_ref(),
            has_values: definition.values.is_some(),
        });

        let RecipeDefinition {
            cookbook_id,
            onclick,
            run,
            onvalidate,
            oninit,
            watch,
            values,
            state,
            ..
        } = definition;

        let onvalidate = match onvalidate {
            Some(onvalidate) => Some(onvalidate),
            None if !watch.is_empty() => Some(default_validator(watch.clone())),
            None => None,
        };

        let recipe = Arc::new(Recipe {
            id,
            name,
            group,
            group_id,
            cookbook_id,
            enabled,
            metadata,
            values,
            state,
            onclick: onclick.or(run),
            onvalidate,
            context_config: self.context_config.clone(),
            context: OnceLock::new(),
        });

        if !enabled {
            debug!(recipe_id = %recipe.id(), "Recipe disabled; skipping setup");
            return Ok(recipe);
        }

        let context = recipe.context();

        for things in &watch {
            let weak = Arc::downgrade(&context);
            let revalidate: WatchCallback = Arc::new(move || {
                if let Some(context) = weak.upgrade() {
                    context.validate();
                }
            });
            things.on_changed(revalidate.clone());
            things.on_meta_changed(revalidate);
        }

        if let Some(oninit) = oninit {
            oninit(&context);
        }

        context.validate();

        debug!(
            recipe_id = %recipe.id(),
            group = recipe.group(),
            name = recipe.name(),
            watching = watch.len(),
            "Normalized recipe"
        );

        Ok(recipe)
    }
}

fn default_validator(watch: Vec<Arc<dyn Watchable>>) -> ContextCallback {
    Arc::new(move |context: &Arc<Context>| {
        if watch.iter().any(|things| things.reachable() == 0) {
            context.set_state(UNREACHABLE_TEXT);
        } else {
            context.set_state(StateUpdate::Clear);
        }
    })
}
