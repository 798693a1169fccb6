//! Category Store
//!
//! In-memory storage beneath the recipe registry. Records are kept in one
//! ordered list per category key. A record whose id matches a stored record
//! replaces it in place; anything else is appended. Nothing is ever removed.

use std::collections::HashMap;
use std::sync::Arc;

/// A record that may carry an identifier
pub trait Record {
    fn record_id(&self) -> Option<&str>;
}

impl<T: Record + ?Sized> Record for Arc<T> {
    fn record_id(&self) -> Option<&str> {
        (**self).record_id()
    }
}

/// Append/update lists keyed by category
#[derive(Debug)]
pub struct CategoryStore<T> {
    categories: HashMap<String, Vec<T>>,
}

impl<T: Record> CategoryStore<T> {
    pub fn new() -> Self {
        Self {
            categories: HashMap::new(),
        }
    }

    /// Insert or replace a record, returning its position in the category
    pub fn upsert(&mut self, category: &str, record: T) -> usize {
        let records = self.categories.entry(category.to_string()).or_default();

        if let Some(id) = record.record_id() {
            if let Some(position) = records
                .iter()
                .position(|existing| existing.record_id() == Some(id))
            {
                records[position] = record;
                return position;
            }
        }

        records.push(record);
        records.len() - 1
    }

    /// Records of a category in storage order
    pub fn get(&self, category: &str) -> &[T] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self, category: &str) -> usize {
        self.get(category).len()
    }

    pub fn is_empty(&self, category: &str) -> bool {
        self.get(category).is_empty()
    }
}

impl<T: Record> Default for CategoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
