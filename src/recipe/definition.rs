//! User-authored recipe definitions
//!
//! A `RecipeDefinition` is the raw shape a cookbook hands to the registry.
//! It is consumed exactly once by the normalizer, which produces a `Recipe`.

use crate::context::Context;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Called when a recipe is clicked (an accepted `ostate` write)
pub type ClickCallback = Arc<dyn Fn(&Arc<Context>, Value) + Send + Sync>;

/// Called with the recipe's context (`oninit`, `onvalidate`)
pub type ContextCallback = Arc<dyn Fn(&Arc<Context>) + Send + Sync>;

/// Listener registered on a watched entity
pub type WatchCallback = Arc<dyn Fn() + Send + Sync>;

/// An external, observable set of things a recipe depends on
pub trait Watchable: Send + Sync {
    /// Number of instances currently reachable
    fn reachable(&self) -> usize;

    /// Register a listener fired when the entity changes
    fn on_changed(&self, callback: WatchCallback);

    /// Register a listener fired when the entity's metadata changes
    fn on_meta_changed(&self, callback: WatchCallback);
}

/// Raw recipe definition
#[derive(Clone, Default)]
pub struct RecipeDefinition {
    pub name: String,
    pub group: Option<String>,
    pub group_id: Option<String>,
    pub cookbook_id: Option<String>,
    /// `Some(false)` keeps the recipe stored but hidden from every lookup
    pub enabled: Option<bool>,

    pub onclick: Option<ClickCallback>,
    /// Legacy name for `onclick`
    pub run: Option<ClickCallback>,
    pub onvalidate: Option<ContextCallback>,
    pub oninit: Option<ContextCallback>,
    pub watch: Vec<Arc<dyn Watchable>>,

    pub value: Option<Value>,
    pub value_type: Option<Value>,
    pub format: Option<Value>,
    pub unit: Option<Value>,
    pub purpose: Option<Value>,
    pub values: Option<BTreeMap<String, Value>>,

    /// Initial fields of the istate projection
    pub state: Map<String, Value>,
}

impl RecipeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn cookbook_id(mut self, cookbook_id: impl Into<String>) -> Self {
        self.cookbook_id = Some(cookbook_id.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn onclick<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Arc<Context>, Value) + Send + Sync + 'static,
    {
        self.onclick = Some(Arc::new(callback));
        self
    }

    pub fn run<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Arc<Context>, Value) + Send + Sync + 'static,
    {
        self.run = Some(Arc::new(callback));
        self
    }

    pub fn onvalidate<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Arc<Context>) + Send + Sync + 'static,
    {
        self.onvalidate = Some(Arc::new(callback));
        self
    }

    pub fn oninit<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Arc<Context>) + Send + Sync + 'static,
    {
        self.oninit = Some(Arc::new(callback));
        self
    }

    pub fn watch(mut self, things: Arc<dyn Watchable>) -> Self {
        self.watch.push(things);
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn value_type(mut self, value_type: impl Into<Value>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    pub fn format(mut self, format: impl Into<Value>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<Value>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn purpose(mut self, purpose: impl Into<Value>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Enumerated values; a click with a key of this map is replaced by its value
    pub fn values<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.values = Some(values.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for RecipeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeDefinition")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("group_id", &self.group_id)
            .field("cookbook_id", &self.cookbook_id)
            .field("enabled", &self.enabled)
            .field("onclick", &self.onclick.is_some())
            .field("watch", &self.watch.len())
            .finish_non_exhaustive()
    }
}
