//! In-memory storage.
//!
//! Uses `BTreeMap` exclusively so listing order is deterministic (by id).

use super::{ListPage, ListQuery, Storage, select_page};
use crate::types::{AffordanceError, Properties};
use std::collections::BTreeMap;

/// Volatile storage: type -> (id -> properties).
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    resources: BTreeMap<String, BTreeMap<String, Properties>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored resources across all types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn create(
        &mut self,
        resource_type: &str,
        id: &str,
        data: &Properties,
    ) -> Result<(), AffordanceError> {
        let bucket = self.resources.entry(resource_type.to_string()).or_default();
        if bucket.contains_key(id) {
            return Err(AffordanceError::Conflict(format!(
                "{}/{} already exists",
                resource_type, id
            )));
        }
        bucket.insert(id.to_string(), data.clone());
        Ok(())
    }

    fn get(&self, resource_type: &str, id: &str) -> Result<Option<Properties>, AffordanceError> {
        Ok(self
            .resources
            .get(resource_type)
            .and_then(|bucket| bucket.get(id))
            .cloned())
    }

    fn update(
        &mut self,
        resource_type: &str,
        id: &str,
        data: &Properties,
    ) -> Result<(), AffordanceError> {
        self.resources
            .entry(resource_type.to_string())
            .or_default()
            .insert(id.to_string(), data.clone());
        Ok(())
    }

    fn delete(&mut self, resource_type: &str, id: &str) -> Result<(), AffordanceError> {
        if let Some(bucket) = self.resources.get_mut(resource_type) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.resources.remove(resource_type);
            }
        }
        Ok(())
    }

    fn list(&self, resource_type: &str, query: &ListQuery) -> Result<ListPage, AffordanceError> {
        let entries = self
            .resources
            .get(resource_type)
            .into_iter()
            .flat_map(|bucket| bucket.iter().map(|(id, props)| (id.clone(), props.clone())));
        Ok(select_page(entries, query))
    }

    fn list_types(&self) -> Result<Vec<String>, AffordanceError> {
        Ok(self.resources.keys().cloned().collect())
    }
}
