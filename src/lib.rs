//! IOTDB Recipes: named automation rules bound to IoT things
//!
//! A registry of user-defined recipes, a per-recipe runtime context that
//! tracks execution and display state, and a transport adapter exposing both
//! over a list / get / put / subscribe protocol with optimistic concurrency.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod recipe;
pub mod registry;
pub mod store;
pub mod timestamp;
pub mod transport;

pub use config::{ConfigLoader, RecipesConfig};
pub use context::{Context, StateUpdate, Status, StatusChanged};
pub use error::{RecipeError, Rejection, TransportError};
pub use recipe::{Recipe, RecipeDefinition, RecipeId, Watchable};
pub use registry::{Registry, SharedRegistry};
pub use timestamp::Timestamp;
pub use transport::{Band, Envelope, ListItem, RecipeTransport, Subscription};
