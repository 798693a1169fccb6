//! Recipe runtime context
//!
//! The `Context` is the live state machine of one recipe. It tracks whether
//! the recipe is running, what it displays, and when it was last modified or
//! executed. Every visible change is announced on the context's status
//! channel; each mutating call announces at most once.

use crate::config::ContextConfig;
use crate::recipe::{Recipe, RecipeId};
use crate::timestamp::Timestamp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Display and execution state of a recipe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub running: bool,
    pub text: Option<String>,
    pub html: Option<String>,
    pub number: Option<Number>,
    pub message: Option<String>,
    /// Fields merged in through `StateUpdate::Fields` that have no slot above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Input to `Context::set_state`
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// Clear text, html and number
    Clear,
    /// Show text; clears html and number
    Text(String),
    /// Show a flag as number 0/1; clears text and html
    Flag(bool),
    /// Show a number; clears text and html
    Number(Number),
    /// Merge fields into the status; `running` is ignored
    Fields(Map<String, Value>),
}

impl From<Value> for StateUpdate {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => StateUpdate::Text(text),
            Value::Bool(flag) => StateUpdate::Flag(flag),
            Value::Number(number) => StateUpdate::Number(number),
            Value::Object(fields) => StateUpdate::Fields(fields),
            Value::Null | Value::Array(_) => StateUpdate::Clear,
        }
    }
}

impl From<&str> for StateUpdate {
    fn from(text: &str) -> Self {
        StateUpdate::Text(text.to_string())
    }
}

impl From<String> for StateUpdate {
    fn from(text: String) -> Self {
        StateUpdate::Text(text)
    }
}

impl From<bool> for StateUpdate {
    fn from(flag: bool) -> Self {
        StateUpdate::Flag(flag)
    }
}

impl From<i64> for StateUpdate {
    fn from(number: i64) -> Self {
        StateUpdate::Number(number.into())
    }
}

impl From<f64> for StateUpdate {
    fn from(number: f64) -> Self {
        Number::from_f64(number)
            .map(StateUpdate::Number)
            .unwrap_or(StateUpdate::Clear)
    }
}

impl<T: Into<StateUpdate>> From<Option<T>> for StateUpdate {
    fn from(update: Option<T>) -> Self {
        update.map(Into::into).unwrap_or(StateUpdate::Clear)
    }
}

/// Announcement that a context's status changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChanged {
    pub id: RecipeId,
}

/// Consistent copy of a context's state
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    pub created_timestamp: Timestamp,
    pub modified_timestamp: Timestamp,
    pub execute_timestamp: Timestamp,
    pub status: Status,
}

struct ContextState {
    modified_timestamp: Timestamp,
    execute_timestamp: Timestamp,
    status: Status,
}

/// Runtime state machine of one recipe
pub struct Context {
    id: RecipeId,
    recipe: Weak<Recipe>,
    created_timestamp: Timestamp,
    done_timeout: Duration,
    state: Mutex<ContextState>,
    notifier: broadcast::Sender<StatusChanged>,
}

impl Context {
    pub(crate) fn new(recipe: Weak<Recipe>, id: RecipeId, config: &ContextConfig) -> Self {
        let (notifier, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            id,
            recipe,
            created_timestamp: Timestamp::make(),
            done_timeout: config.done_timeout(),
            state: Mutex::new(ContextState {
                modified_timestamp: Timestamp::make(),
                execute_timestamp: Timestamp::make(),
                status: Status::default(),
            }),
            notifier,
        }
    }

    pub fn id(&self) -> &RecipeId {
        &self.id
    }

    /// The owning recipe, if it is still alive
    pub fn recipe(&self) -> Option<Arc<Recipe>> {
        self.recipe.upgrade()
    }

    pub fn created_timestamp(&self) -> Timestamp {
        self.created_timestamp
    }

    pub fn modified_timestamp(&self) -> Timestamp {
        self.state.lock().modified_timestamp
    }

    pub fn execute_timestamp(&self) -> Timestamp {
        self.state.lock().execute_timestamp
    }

    pub fn status(&self) -> Status {
        self.state.lock().status.clone()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let state = self.state.lock();
        ContextSnapshot {
            created_timestamp: self.created_timestamp,
            modified_timestamp: state.modified_timestamp,
            execute_timestamp: state.execute_timestamp,
            status: state.status.clone(),
        }
    }

    /// Listen for status changes; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChanged> {
        self.notifier.subscribe()
    }

    /// Mark the recipe as running with a progress message
    pub fn set_message(&self, message: impl Into<String>) {
        self.apply_message(Some(message.into()));
    }

    /// Mark the recipe idle and clear its message
    pub fn clear_message(&self) {
        self.apply_message(None);
    }

    fn apply_message(&self, message: Option<String>) {
        {
            let mut state = self.state.lock();
            let running = message.is_some();
            let running_flipped = state.status.running != running;
            if !running_flipped && state.status.message == message {
                return;
            }

            state.status.running = running;
            state.status.message = message;

            // running is also visible on ostate
            if running_flipped {
                state.execute_timestamp = Timestamp::make_after(&state.execute_timestamp);
            }
            state.modified_timestamp = Timestamp::make_after(&state.modified_timestamp);
        }

        self.notify();
    }

    /// Change what the recipe displays. Never touches `running`.
    pub fn set_state(&self, update: impl Into<StateUpdate>) {
        let update = update.into();
        {
            let mut state = self.state.lock();
            let status = &mut state.status;
            let before = (status.text.clone(), status.html.clone(), status.number.clone());

            match update {
                StateUpdate::Clear => {
                    status.text = None;
                    status.html = None;
                    status.number = None;
                }
                StateUpdate::Text(text) => {
                    status.text = Some(text);
                    status.html = None;
                    status.number = None;
                }
                StateUpdate::Flag(flag) => {
                    status.text = None;
                    status.html = None;
                    status.number = Some(Number::from(u8::from(flag)));
                }
                StateUpdate::Number(number) => {
                    status.text = None;
                    status.html = None;
                    status.number = Some(number);
                }
                StateUpdate::Fields(fields) => merge_fields(status, fields),
            }

            let after = (status.text.clone(), status.html.clone(), status.number.clone());
            if before == after {
                return;
            }
            state.modified_timestamp = Timestamp::make_after(&state.modified_timestamp);
        }

        self.notify();
    }

    /// Run the recipe's `onvalidate` callback, if it has one
    pub fn validate(self: &Arc<Self>) {
        let Some(recipe) = self.recipe() else {
            return;
        };
        if let Some(onvalidate) = recipe.onvalidate() {
            onvalidate(self);
        }
    }

    /// After `timeout` (default from configuration), mark the recipe idle
    ///
    /// Fire-and-forget; a later state change does not cancel the reset.
    pub fn done(self: &Arc<Self>, timeout: Option<Duration>) {
        let delay = timeout.unwrap_or(self.done_timeout);
        let weak = Arc::downgrade(self);
        let reset = move || {
            if let Some(context) = weak.upgrade() {
                context.clear_message();
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    reset();
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    reset();
                });
            }
        }
    }

    /// Handle a click: stop running, resolve enumerated values, refresh the
    /// execute timestamp and hand the value to the recipe's `onclick`
    pub fn on_click(self: &Arc<Self>, value: Value) {
        let recipe = self.recipe();

        let value = match recipe.as_ref().and_then(|r| r.values()) {
            Some(values) => enumeration_key(&value)
                .and_then(|key| values.get(&key).cloned())
                .unwrap_or(value),
            None => value,
        };

        {
            let mut state = self.state.lock();
            state.status.running = false;
            state.execute_timestamp = Timestamp::make_after(&state.execute_timestamp);
        }

        match recipe.as_ref().and_then(|r| r.onclick()) {
            Some(onclick) => onclick(self, value),
            None => info!(
                recipe_id = %self.id,
                "no 'onclick' method: attempt to click a recipe that doesn't want to be clicked"
            ),
        }
    }

    /// Adopt an externally supplied execute timestamp unless it is older
    ///
    /// Returns false, leaving the context untouched, when the incoming
    /// timestamp is missing or older than the current one.
    pub fn accept_execute_timestamp(&self, incoming: Option<&Timestamp>) -> bool {
        let mut state = self.state.lock();
        if !Timestamp::check(Some(&state.execute_timestamp), incoming) {
            return false;
        }
        if let Some(incoming) = incoming {
            state.execute_timestamp = *incoming;
        }
        true
    }

    fn notify(&self) {
        let changed = StatusChanged {
            id: self.id.clone(),
        };
        if self.notifier.send(changed).is_err() {
            trace!(recipe_id = %self.id, "status changed with no listeners");
        }
    }
}

fn merge_fields(status: &mut Status, fields: Map<String, Value>) {
    for (key, value) in fields {
        match key.as_str() {
            "text" => status.text = display_text(value),
            "html" => status.html = display_text(value),
            "message" => status.message = display_text(value),
            "number" => {
                status.number = match value {
                    Value::Number(number) => Some(number),
                    Value::Bool(flag) => Some(Number::from(u8::from(flag))),
                    _ => None,
                }
            }
            "running" => debug!("ignoring 'running' in state fields"),
            _ => {
                status.extra.insert(key, value);
            }
        }
    }
}

fn display_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn enumeration_key(value: &Value) -> Option<String> {
    match value {
        Value::String(key) => Some(key.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
