//! RecipeId computation

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every recipe identifier
pub const RECIPE_URN_PREFIX: &str = "urn:iotdb:recipe:";

/// Salt mixed into hashed identifiers; changing it renames every recipe
const RECIPE_ID_SALT: &str = "2014-12-13T06:34:00";

/// Stable identifier of a recipe
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    /// Derive the identifier for a recipe
    ///
    /// RecipeId = prefix || group_id, when a non-empty group_id is given
    /// RecipeId = prefix || hex(hash(salt || group || name)[..16]) otherwise
    ///
    /// Two recipes sharing (group, name) without a group_id share an id.
    pub fn derive(group_id: Option<&str>, group: &str, name: &str) -> Self {
        if let Some(group_id) = group_id.filter(|g| !g.is_empty()) {
            return Self(format!("{}{}", RECIPE_URN_PREFIX, group_id));
        }

        let mut hasher = Hasher::new();
        hasher.update(b"salt:");
        hasher.update(RECIPE_ID_SALT.as_bytes());
        hasher.update(b"group:");
        hasher.update(group.as_bytes());
        hasher.update(b"name:");
        hasher.update(name.as_bytes());
        let hash = hasher.finalize();

        Self(format!(
            "{}{}",
            RECIPE_URN_PREFIX,
            hex::encode(&hash.as_bytes()[..16])
        ))
    }

    /// Whether a raw id is in the recipe URN namespace
    pub fn is_recipe_urn(raw: &str) -> bool {
        raw.starts_with(RECIPE_URN_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecipeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for RecipeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
