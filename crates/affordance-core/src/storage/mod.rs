//! # Storage
//!
//! The persistence collaborator of the store.
//!
//! The store only ever sees the `Storage` trait: raw property bags keyed by
//! `(type, id)`. Two implementations ship with the engine:
//! - `MemoryStorage`: `BTreeMap`-backed, volatile
//! - `RedbStorage`: disk-backed ACID storage using redb
//!
//! `StorageBackend` selects between them at runtime.
//!
//! Filtering is equality-only. A string filter value also matches a number or
//! bool property whose JSON text equals it, so filters read from a URI query
//! string behave as expected.

mod memory;
mod redb_store;

pub use memory::MemoryStorage;
pub use redb_store::RedbStorage;

use crate::primitives::DEFAULT_PAGE_SIZE;
use crate::types::{AffordanceError, Properties};
use serde_json::Value;

// =============================================================================
// QUERY TYPES
// =============================================================================

/// Filter and page selection for `Storage::list`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// Equality filter over properties. Empty matches everything.
    pub filter: Properties,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: Properties::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of raw stored items plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListPage {
    /// `(id, properties)` pairs ordered by id.
    pub items: Vec<(String, Properties)>,
    pub total_items: usize,
}

// =============================================================================
// STORAGE TRAIT
// =============================================================================

/// Raw key-value persistence of property bags.
///
/// Implementations own retries, if any. The engine never retries.
pub trait Storage {
    /// Insert a new bag. Fails with `Conflict` if `(type, id)` already exists.
    fn create(
        &mut self,
        resource_type: &str,
        id: &str,
        data: &Properties,
    ) -> Result<(), AffordanceError>;

    /// Load a bag. `None` when absent.
    fn get(&self, resource_type: &str, id: &str) -> Result<Option<Properties>, AffordanceError>;

    /// Replace the bag stored under `(type, id)`.
    fn update(
        &mut self,
        resource_type: &str,
        id: &str,
        data: &Properties,
    ) -> Result<(), AffordanceError>;

    /// Remove a bag. Removing an absent key succeeds.
    fn delete(&mut self, resource_type: &str, id: &str) -> Result<(), AffordanceError>;

    /// Filter and page the bags of one type, ordered by id.
    fn list(&self, resource_type: &str, query: &ListQuery) -> Result<ListPage, AffordanceError>;

    /// Every type with at least one stored resource, in order.
    fn list_types(&self) -> Result<Vec<String>, AffordanceError>;
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Whether a property bag satisfies an equality filter.
#[must_use]
pub fn matches_filter(properties: &Properties, filter: &Properties) -> bool {
    filter.iter().all(|(key, expected)| {
        properties
            .get(key)
            .is_some_and(|actual| value_matches(actual, expected))
    })
}

fn value_matches(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(_) | Value::Bool(_), Value::String(text)) => actual.to_string() == *text,
        _ => false,
    }
}

/// Apply filter and paging to an id-ordered sequence of bags.
pub(crate) fn select_page<I>(entries: I, query: &ListQuery) -> ListPage
where
    I: IntoIterator<Item = (String, Properties)>,
{
    let offset = query.page.max(1).saturating_sub(1).saturating_mul(query.page_size);
    let mut page = ListPage::default();

    for (id, properties) in entries {
        if !matches_filter(&properties, &query.filter) {
            continue;
        }
        if page.total_items >= offset && page.items.len() < query.page_size {
            page.items.push((id, properties));
        }
        page.total_items = page.total_items.saturating_add(1);
    }

    page
}

// =============================================================================
// BACKEND SELECTION
// =============================================================================

/// Runtime choice of storage.
#[derive(Debug)]
pub enum StorageBackend {
    /// Volatile in-memory storage.
    InMemory(MemoryStorage),
    /// Disk-backed storage using redb (ACID, persistent).
    Persistent(RedbStorage),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStorage::new())
    }
}

impl StorageBackend {
    /// Open a redb-backed store at `path`.
    pub fn redb(path: impl AsRef<std::path::Path>) -> Result<Self, AffordanceError> {
        Ok(Self::Persistent(RedbStorage::open(path)?))
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    /// Compact the backing file. In-memory storage has nothing to reclaim.
    pub fn compact(&mut self) -> Result<bool, AffordanceError> {
        match self {
            Self::InMemory(_) => Ok(false),
            Self::Persistent(redb) => redb.compact(),
        }
    }
}

impl Storage for StorageBackend {
    fn create(
        &mut self,
        resource_type: &str,
        id: &str,
        data: &Properties,
    ) -> Result<(), AffordanceError> {
        match self {
            Self::InMemory(s) => s.create(resource_type, id, data),
            Self::Persistent(s) => s.create(resource_type, id, data),
        }
    }

    fn get(&self, resource_type: &str, id: &str) -> Result<Option<Properties>, AffordanceError> {
        match self {
            Self::InMemory(s) => s.get(resource_type, id),
            Self::Persistent(s) => s.get(resource_type, id),
        }
    }

    fn update(
        &mut self,
        resource_type: &str,
        id: &str,
        data: &Properties,
    ) -> Result<(), AffordanceError> {
        match self {
            Self::InMemory(s) => s.update(resource_type, id, data),
            Self::Persistent(s) => s.update(resource_type, id, data),
        }
    }

    fn delete(&mut self, resource_type: &str, id: &str) -> Result<(), AffordanceError> {
        match self {
            Self::InMemory(s) => s.delete(resource_type, id),
            Self::Persistent(s) => s.delete(resource_type, id),
        }
    }

    fn list(&self, resource_type: &str, query: &ListQuery) -> Result<ListPage, AffordanceError> {
        match self {
            Self::InMemory(s) => s.list(resource_type, query),
            Self::Persistent(s) => s.list(resource_type, query),
        }
    }

    fn list_types(&self) -> Result<Vec<String>, AffordanceError> {
        match self {
            Self::InMemory(s) => s.list_types(),
            Self::Persistent(s) => s.list_types(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => Properties::new(),
        }
    }

    #[test]
    fn equality_filter() {
        let props = bag(json!({"color": "red", "size": 3, "active": true}));
        assert!(matches_filter(&props, &Properties::new()));
        assert!(matches_filter(&props, &bag(json!({"color": "red"}))));
        assert!(!matches_filter(&props, &bag(json!({"color": "blue"}))));
        assert!(!matches_filter(&props, &bag(json!({"missing": "x"}))));
        assert!(matches_filter(&props, &bag(json!({"size": 3, "color": "red"}))));
    }

    #[test]
    fn string_filter_matches_scalar_text() {
        let props = bag(json!({"size": 3, "active": true, "label": "3"}));
        assert!(matches_filter(&props, &bag(json!({"size": "3"}))));
        assert!(matches_filter(&props, &bag(json!({"active": "true"}))));
        assert!(!matches_filter(&props, &bag(json!({"label": 3}))));
    }

    #[test]
    fn select_page_counts_all_matches() {
        let entries = (1..=5).map(|i| {
            let color = if i % 2 == 0 { "blue" } else { "red" };
            (format!("w{}", i), bag(json!({"color": color})))
        });
        let query = ListQuery {
            filter: bag(json!({"color": "red"})),
            page: 2,
            page_size: 2,
        };
        let page = select_page(entries, &query);
        assert_eq!(page.total_items, 3);
        let ids: Vec<_> = page.items.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["w5"]);
    }

    #[test]
    fn select_page_past_the_end_is_empty() {
        let entries = (1..=3).map(|i| (format!("w{}", i), Properties::new()));
        let query = ListQuery {
            page: 9,
            ..ListQuery::default()
        };
        let page = select_page(entries, &query);
        assert!(page.items.is_empty());
        assert_eq!(page.total_items, 3);
    }
}
