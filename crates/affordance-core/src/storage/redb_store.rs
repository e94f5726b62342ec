//! # redb-backed Storage
//!
//! A disk-backed property-bag store using the redb embedded database.
//!
//! - One table keyed by `(type, id)`, values are JSON-encoded property bags
//! - Every write runs in its own ACID transaction
//! - Listing walks the key range of one type, so results come back ordered by id
//!
//! There is no cross-resource transaction: the engine makes no atomicity
//! guarantee across two writes.

use super::{ListPage, ListQuery, Storage, select_page};
use crate::types::{AffordanceError, Properties};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for resources: (type, id) -> JSON property bag
const RESOURCES: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("resources");

fn io_err(e: impl std::fmt::Display) -> AffordanceError {
    AffordanceError::IoError(e.to_string())
}

fn encode(data: &Properties) -> Result<Vec<u8>, AffordanceError> {
    serde_json::to_vec(data).map_err(|e| AffordanceError::SerializationError(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Properties, AffordanceError> {
    serde_json::from_slice(bytes).map_err(|e| AffordanceError::SerializationError(e.to_string()))
}

/// Disk-backed storage using redb.
pub struct RedbStorage {
    db: Database,
}

impl std::fmt::Debug for RedbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage").finish_non_exhaustive()
    }
}

impl RedbStorage {
    /// Open or create a resource database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AffordanceError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize the table if it doesn't exist
        let write_txn = db.begin_write().map_err(io_err)?;
        {
            let _ = write_txn.open_table(RESOURCES).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        tracing::info!(path = %path.as_ref().display(), "opened redb resource store");
        Ok(Self { db })
    }

    /// Compact the database file. Returns whether any space was reclaimed.
    pub fn compact(&mut self) -> Result<bool, AffordanceError> {
        self.db.compact().map_err(io_err)
    }

    fn write(&self, resource_type: &str, id: &str, bytes: &[u8]) -> Result<(), AffordanceError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(RESOURCES).map_err(io_err)?;
            table.insert((resource_type, id), bytes).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)
    }
}

impl Storage for RedbStorage {
    fn create(
        &mut self,
        resource_type: &str,
        id: &str,
        data: &Properties,
    ) -> Result<(), AffordanceError> {
        let bytes = encode(data)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(RESOURCES).map_err(io_err)?;
            let exists = table.get((resource_type, id)).map_err(io_err)?.is_some();
            if exists {
                return Err(AffordanceError::Conflict(format!(
                    "{}/{} already exists",
                    resource_type, id
                )));
            }
            table
                .insert((resource_type, id), bytes.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)
    }

    fn get(&self, resource_type: &str, id: &str) -> Result<Option<Properties>, AffordanceError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RESOURCES).map_err(io_err)?;
        let stored = table.get((resource_type, id)).map_err(io_err)?;
        stored.map(|guard| decode(guard.value())).transpose()
    }

    fn update(
        &mut self,
        resource_type: &str,
        id: &str,
        data: &Properties,
    ) -> Result<(), AffordanceError> {
        let bytes = encode(data)?;
        self.write(resource_type, id, &bytes)
    }

    fn delete(&mut self, resource_type: &str, id: &str) -> Result<(), AffordanceError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(RESOURCES).map_err(io_err)?;
            table.remove((resource_type, id)).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)
    }

    fn list(&self, resource_type: &str, query: &ListQuery) -> Result<ListPage, AffordanceError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RESOURCES).map_err(io_err)?;

        let start: (&str, &str) = (resource_type, "");
        let mut entries = Vec::new();
        for entry in table.range(start..).map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (stored_type, id) = key.value();
            if stored_type != resource_type {
                break;
            }
            entries.push((id.to_string(), decode(value.value())?));
        }

        Ok(select_page(entries, query))
    }

    fn list_types(&self) -> Result<Vec<String>, AffordanceError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RESOURCES).map_err(io_err)?;

        let mut types: Vec<String> = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            let (stored_type, _) = key.value();
            if types.last().map(String::as_str) != Some(stored_type) {
                types.push(stored_type.to_string());
            }
        }
        Ok(types)
    }
}
