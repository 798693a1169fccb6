//! Transport Adapter
//!
//! Exposes the recipe registry over a generic list / get / put / subscribe
//! protocol. Every operation authorizes first, then reads or mutates the
//! recipe's context. Failures come back as a `Rejection` echoing the request.

use crate::config::TransportConfig;
use crate::error::{Rejection, TransportError};
use crate::recipe::{projection, Recipe, RecipeId};
use crate::registry::SharedRegistry;
use crate::timestamp::Timestamp;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::ControlFlow;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod authorize;
pub mod subscribe;

pub use authorize::{Access, AllowAll, AuthorizeRequest, Authorizer, FnAuthorizer};
pub use subscribe::Subscription;

/// Views of a recipe a transport can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Istate,
    Ostate,
    Model,
    Meta,
    Status,
}

impl Band {
    pub const ALL: [Band; 5] = [
        Band::Istate,
        Band::Ostate,
        Band::Model,
        Band::Meta,
        Band::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Istate => "istate",
            Band::Ostate => "ostate",
            Band::Model => "model",
            Band::Meta => "meta",
            Band::Status => "status",
        }
    }

    /// Whether subscribers receive updates for this band (`model` is static)
    pub fn is_pushed(&self) -> bool {
        !matches!(self, Band::Model)
    }

    fn project(&self, recipe: &Arc<Recipe>) -> Map<String, Value> {
        match self {
            Band::Istate => projection::istate(recipe),
            Band::Ostate => projection::ostate(recipe),
            Band::Model => projection::model(recipe),
            Band::Meta => projection::meta(recipe),
            Band::Status => projection::status(recipe),
        }
    }
}

impl FromStr for Band {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Band::ALL
            .into_iter()
            .find(|band| band.as_str() == s)
            .ok_or(TransportError::NotFound)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request or response of a transport operation
///
/// The same shape travels both ways: requests fill in what they ask about,
/// responses echo the request with `value` replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_band(mut self, band: impl Into<String>) -> Self {
        self.band = Some(band.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_user_opt(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }
}

/// One item produced by `list`
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Entry(Envelope),
    End,
}

/// Recipe registry exposed as a transport
#[derive(Clone)]
pub struct RecipeTransport {
    registry: SharedRegistry,
    authorizer: Arc<dyn Authorizer>,
    user: Option<String>,
}

impl RecipeTransport {
    /// Transport allowing everything, with no default user
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            authorizer: Arc::new(AllowAll),
            user: None,
        }
    }

    pub fn from_config(registry: SharedRegistry, config: &TransportConfig) -> Self {
        Self::new(registry).with_user_opt(config.user.clone())
    }

    pub fn with_authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    /// User attached to requests that carry none
    pub fn with_user(self, user: impl Into<String>) -> Self {
        self.with_user_opt(Some(user.into()))
    }

    fn with_user_opt(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    fn authorizer(&self) -> &dyn Authorizer {
        self.authorizer.as_ref()
    }

    fn effective_user(&self, request: &Envelope) -> Option<String> {
        request.user.clone().or_else(|| self.user.clone())
    }

    fn lookup(&self, id: &str) -> Option<Arc<Recipe>> {
        self.registry.read().find_by_id(id)
    }

    /// Emit one entry per enabled recipe, then `ListItem::End`
    ///
    /// Read access to every recipe is checked up front; a single denial
    /// rejects the whole listing before anything is emitted. The sink may
    /// stop early by returning `ControlFlow::Break`; the end marker still
    /// follows.
    pub async fn list<F>(&self, request: Envelope, mut sink: F) -> Result<(), Rejection>
    where
        F: FnMut(ListItem) -> ControlFlow<()>,
    {
        let user = self.effective_user(&request);
        let recipes = self.registry.read().recipes();

        let checks = recipes.iter().map(|recipe| {
            let query = AuthorizeRequest::read(recipe.id().as_str(), None, user.clone());
            async move { self.authorizer.authorize(&query).await }
        });
        let granted = join_all(checks).await;

        let template = Envelope {
            id: None,
            band: None,
            value: None,
            user,
        };

        if granted.iter().any(|allowed| !allowed) {
            warn!(method = "list", "Listing not authorized");
            return Err(Rejection::new(
                TransportError::NotAuthorized,
                Envelope {
                    id: request.id,
                    ..template
                },
            ));
        }

        for recipe in &recipes {
            let entry = template.clone().with_id(recipe.id().as_str());
            if sink(ListItem::Entry(entry)).is_break() {
                break;
            }
        }
        let _ = sink(ListItem::End);

        Ok(())
    }

    /// Never supported by recipes
    pub async fn added(&self, request: Envelope) -> Result<Envelope, Rejection> {
        Err(Rejection::new(TransportError::NeverImplemented, request))
    }

    /// Read one band of a recipe
    pub async fn get(&self, request: Envelope) -> Result<Envelope, Rejection> {
        let user = self.effective_user(&request);
        let mut response = Envelope {
            value: None,
            user: user.clone(),
            ..request
        };
        let reject = |error, echo: &Envelope| Rejection::new(error, echo.clone());

        let Some(id) = response.id.clone() else {
            return Err(reject(TransportError::NotFound, &response));
        };
        let Some(recipe) = self.lookup(&id) else {
            return Err(reject(TransportError::NotFound, &response));
        };
        let band = match response.band.as_deref().map(str::parse::<Band>) {
            Some(Ok(band)) => band,
            Some(Err(error)) => return Err(reject(error, &response)),
            None => return Err(reject(TransportError::NotFound, &response)),
        };

        let query = AuthorizeRequest::read(id.as_str(), Some(band), user);
        if !self.authorizer.authorize(&query).await {
            debug!(method = "get", id = %id, band = %band, "Not authorized");
            return Err(reject(TransportError::NotAuthorized, &response));
        }

        let mut value = band.project(&recipe);
        value.remove("@id");
        value.remove("@value");

        response.value = Some(Value::Object(value));
        Ok(response)
    }

    /// Write one band of a recipe
    ///
    /// Only `ostate` is writable: its `@timestamp` must be newer than the
    /// recipe's last execution, after which `value` is handed to the recipe
    /// as a click.
    pub async fn put(&self, request: Envelope) -> Result<Envelope, Rejection> {
        let user = self.effective_user(&request);
        let echo = Envelope {
            user: user.clone(),
            ..request
        };

        let id = match echo.id.as_deref() {
            Some(id) if RecipeId::is_recipe_urn(id) => id.to_string(),
            _ => return Err(Rejection::new(TransportError::NotAppropriate, echo)),
        };

        let Some(recipe) = self.lookup(&id) else {
            warn!(method = "put", id = %id, "Recipe not found");
            return Err(Rejection::new(TransportError::NotFound, echo));
        };

        match echo.band.as_deref().map(str::parse::<Band>) {
            Some(Ok(Band::Ostate)) => {
                let query = AuthorizeRequest::write(id.as_str(), Band::Ostate, user);
                if !self.authorizer.authorize(&query).await {
                    warn!(method = "put", id = %id, band = "ostate", "Not authorized");
                    return Err(Rejection::new(TransportError::NotAuthorized, echo));
                }

                let value = echo.value.clone().unwrap_or(Value::Null);
                let incoming = value.get("@timestamp").and_then(Timestamp::from_value);

                let context = recipe.context();
                if !context.accept_execute_timestamp(incoming.as_ref()) {
                    warn!(
                        method = "put",
                        id = %id,
                        incoming = ?incoming.map(|t| t.to_string()),
                        current = %context.execute_timestamp(),
                        "Timestamp conflict"
                    );
                    return Err(Rejection::new(TransportError::TimestampConflict, echo));
                }

                let click = value.get("value").cloned().unwrap_or(Value::Null);
                context.on_click(click);
                Ok(echo)
            }
            Some(Ok(Band::Meta)) => {
                let query = AuthorizeRequest::write(id.as_str(), Band::Meta, user);
                if !self.authorizer.authorize(&query).await {
                    warn!(method = "put", id = %id, band = "meta", "Not authorized");
                    return Err(Rejection::new(TransportError::NotAuthorized, echo));
                }
                Err(Rejection::new(TransportError::NotImplemented, echo))
            }
            _ => {
                warn!(method = "put", id = %id, band = ?echo.band, "Method not allowed");
                Err(Rejection::new(TransportError::MethodNotAllowed, echo))
            }
        }
    }

    /// Watch recipes for status changes
    ///
    /// Without a band every pushed band is watched; without an id every
    /// current recipe is. Each change is re-authorized per band before the
    /// fresh `get` result is delivered.
    pub async fn subscribe(&self, request: Envelope) -> Result<Subscription, Rejection> {
        let user = self.effective_user(&request);

        let bands: Vec<Band> = match request.band.as_deref() {
            Some(raw) => {
                let band = raw.parse::<Band>().map_err(|error| {
                    Rejection::new(
                        error,
                        Envelope {
                            user: user.clone(),
                            ..request.clone()
                        },
                    )
                })?;
                vec![band]
            }
            None => Band::ALL.to_vec(),
        };
        let bands: Vec<Band> = bands.into_iter().filter(Band::is_pushed).collect();

        let recipes = self.registry.read().recipes();
        let (sender, receiver) = subscribe::channel();
        let mut tasks = Vec::new();

        if !bands.is_empty() {
            for recipe in recipes {
                if request.id.as_deref().is_some_and(|id| id != recipe.id().as_str()) {
                    continue;
                }
                let changes = recipe.context().subscribe();
                tasks.push(subscribe::spawn_listener(
                    self.clone(),
                    recipe.id().clone(),
                    changes,
                    bands.clone(),
                    user.clone(),
                    sender.clone(),
                ));
            }
        }

        debug!(
            listeners = tasks.len(),
            bands = ?bands,
            "Subscribed to recipe updates"
        );

        Ok(Subscription::new(receiver, tasks))
    }
}

impl fmt::Debug for RecipeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeTransport")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
