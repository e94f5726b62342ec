//! # Store
//!
//! The orchestrator of the engine. Persists raw property bags through a
//! `Storage` collaborator, consults the `MachineRegistry` for action and
//! transition legality, and runs the enhancement pipeline on every load.
//!
//! ## Concurrency
//!
//! A `Store` is single-threaded. Two callers running `update` or
//! `perform_action` against the same `(type, id)` through separate stores
//! over the same storage race read-modify-write; no per-key lock is taken.

use crate::collection::{Collection, Pagination};
use crate::config::{
    CollectionSettings, EngineConfig, GraphSettings, PresentationRule, PromptRule,
};
use crate::enhance::{Enhancer, StoredResource};
use crate::primitives::{
    ACTION_CREATE, ACTION_DELETE, ACTION_FILTER, ACTION_GET, ACTION_UPDATE,
    CREATED_AT_KEY, FORBIDDEN_SEGMENT_CHARS, INTERNAL_KEYS, MAX_ID_LENGTH,
    MAX_PROPERTY_KEY_LENGTH, MAX_TYPE_LENGTH, STATUS_HISTORY_KEY, STATUS_KEY,
    STORED_LINKS_KEY, UPDATED_AT_KEY,
};
use crate::resource::{Resource, StatusChange};
use crate::state_machine::{MachineRegistry, StateMachineDefinition};
use crate::storage::{ListQuery, Storage, StorageBackend};
use crate::types::{ActionDef, ActionMethod, AffordanceError, Link, Properties};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Property naming the identifier in a `create` payload.
const ID_KEY: &str = "id";

// =============================================================================
// QUERY
// =============================================================================

/// Filter and paging request for `Store::get_collection`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionQuery {
    /// Equality filter. Empty matches everything.
    pub filter: Properties,
    /// 1-based page. `0` is read as `1`.
    pub page: usize,
    /// `None` uses the configured default.
    pub page_size: Option<usize>,
}

impl CollectionQuery {
    /// Query page `page` of `page_size` items.
    #[must_use]
    pub fn page(page: usize, page_size: usize) -> Self {
        Self {
            filter: Properties::new(),
            page,
            page_size: Some(page_size),
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.filter.insert(key.into(), value);
        self
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Resource store over a storage collaborator.
#[derive(Debug)]
pub struct Store<S: Storage = StorageBackend> {
    storage: S,
    machines: MachineRegistry,
    presentation: BTreeMap<String, PresentationRule>,
    prompts: BTreeMap<String, Vec<PromptRule>>,
    collection: CollectionSettings,
    graph: GraphSettings,
}

impl<S: Storage> Store<S> {
    /// Create a store with default settings and no state machines.
    pub fn new(storage: S) -> Self {
        Self::with_registry(storage, MachineRegistry::new())
    }

    /// Create a store with an explicit machine registry.
    pub fn with_registry(storage: S, machines: MachineRegistry) -> Self {
        Self {
            storage,
            machines,
            presentation: BTreeMap::new(),
            prompts: BTreeMap::new(),
            collection: CollectionSettings::default(),
            graph: GraphSettings::default(),
        }
    }

    /// Create a store from a loaded configuration.
    pub fn from_config(storage: S, config: &EngineConfig) -> Result<Self, AffordanceError> {
        config.validate()?;
        Ok(Self {
            storage,
            machines: config.machine_registry()?,
            presentation: config.presentation.clone(),
            prompts: config.prompts.clone(),
            collection: config.collection.clone(),
            graph: config.graph.clone(),
        })
    }

    /// Validate and register a state machine, replacing any existing one.
    pub fn register_state_machine(
        &mut self,
        resource_type: impl Into<String>,
        definition: StateMachineDefinition,
    ) -> Result<(), AffordanceError> {
        self.machines.register(resource_type, definition)?;
        Ok(())
    }

    #[must_use]
    pub fn machines(&self) -> &MachineRegistry {
        &self.machines
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    #[must_use]
    pub fn collection_settings(&self) -> &CollectionSettings {
        &self.collection
    }

    #[must_use]
    pub fn graph_settings(&self) -> &GraphSettings {
        &self.graph
    }

    /// The enhancement pipeline bound to this store's configuration.
    #[must_use]
    pub fn enhancer(&self) -> Enhancer<'_> {
        Enhancer::new(&self.machines, &self.presentation, &self.prompts)
    }

    fn build(&self, resource_type: &str, id: &str, properties: Properties) -> Resource {
        self.enhancer()
            .enhance(&StoredResource::new(resource_type, id, properties))
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Create a resource.
    ///
    /// The id comes from `data.id` when present, otherwise a fresh UUID v4.
    /// Governed types always start in their machine's initial state.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed type, id or bag
    /// - `Conflict` if `(type, id)` already exists
    pub fn create(
        &mut self,
        resource_type: &str,
        mut data: Properties,
    ) -> Result<Resource, AffordanceError> {
        validate_segment("type", resource_type, MAX_TYPE_LENGTH)?;
        let id = match data.remove(ID_KEY) {
            Some(Value::String(id)) => id,
            Some(other) => {
                return Err(AffordanceError::ValidationError(format!(
                    "id must be a string, got {}",
                    other
                )));
            }
            None => Uuid::new_v4().to_string(),
        };
        validate_segment("id", &id, MAX_ID_LENGTH)?;
        validate_caller_bag(&data)?;

        let now = timestamp();
        data.insert(CREATED_AT_KEY.to_string(), Value::String(now.clone()));
        data.insert(UPDATED_AT_KEY.to_string(), Value::String(now));
        if let Some(machine) = self.machines.get(resource_type) {
            data.insert(
                STATUS_KEY.to_string(),
                Value::String(machine.initial_state().to_string()),
            );
        }

        self.storage.create(resource_type, &id, &data)?;
        tracing::debug!(resource_type, id = %id, "created resource");
        Ok(self.build(resource_type, &id, data))
    }

    /// Load and enhance a resource. `None` when absent.
    pub fn get(&self, resource_type: &str, id: &str) -> Result<Option<Resource>, AffordanceError> {
        Ok(self
            .storage
            .get(resource_type, id)?
            .map(|data| self.build(resource_type, id, data)))
    }

    /// Merge `updates` over a stored resource.
    ///
    /// `id` and `createdAt` are preserved; `updatedAt` is restamped.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the resource is absent
    /// - `Conflict` if the type is governed and `updates` carries `status`
    /// - `ValidationError` for reserved or malformed keys
    pub fn update(
        &mut self,
        resource_type: &str,
        id: &str,
        updates: Properties,
    ) -> Result<Resource, AffordanceError> {
        let mut data = self.load(resource_type, id)?;
        self.reject_status_write(resource_type, &updates)?;
        validate_caller_bag(&updates)?;

        merge(&mut data, updates);
        self.storage.update(resource_type, id, &data)?;
        tracing::debug!(resource_type, id, "updated resource");
        Ok(self.build(resource_type, id, data))
    }

    /// Delete a resource. Deleting an absent resource succeeds.
    pub fn delete(&mut self, resource_type: &str, id: &str) -> Result<(), AffordanceError> {
        self.storage.delete(resource_type, id)?;
        tracing::debug!(resource_type, id, "deleted resource");
        Ok(())
    }

    /// Every type with at least one stored resource.
    pub fn list_types(&self) -> Result<Vec<String>, AffordanceError> {
        self.storage.list_types()
    }

    // =========================================================================
    // COLLECTIONS
    // =========================================================================

    /// Load one filtered page of a type as a collection.
    ///
    /// Page size defaults from configuration and is clamped to the configured
    /// maximum.
    ///
    /// # Errors
    ///
    /// `ValidationError` if `page_size` is zero.
    pub fn get_collection(
        &self,
        resource_type: &str,
        query: &CollectionQuery,
    ) -> Result<Collection, AffordanceError> {
        let page = query.page.max(1);
        let page_size = match query.page_size {
            Some(0) => {
                return Err(AffordanceError::ValidationError(
                    "pageSize must be greater than zero".to_string(),
                ));
            }
            Some(size) => size.min(self.collection.max_page_size),
            None => self.collection.default_page_size,
        };

        let listed = self.storage.list(
            resource_type,
            &ListQuery {
                filter: query.filter.clone(),
                page,
                page_size,
            },
        )?;

        let mut collection = Collection::new(resource_type);
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        for (id, data) in listed.items {
            let resource = self.build(resource_type, &id, data);
            if let Some(status) = resource.property_str(STATUS_KEY) {
                *by_status.entry(status.to_string()).or_default() += 1;
            }
            collection.add_item(resource)?;
        }

        collection.set_pagination(Pagination::new(page, page_size, listed.total_items));
        collection.set_filters(query.filter.clone());

        let mut aggregates = Properties::new();
        aggregates.insert("count".to_string(), Value::from(listed.total_items));
        if !by_status.is_empty() {
            let counts = by_status
                .into_iter()
                .map(|(status, n)| (status, Value::from(n)))
                .collect();
            aggregates.insert("byStatus".to_string(), Value::Object(counts));
        }
        collection.set_aggregates(aggregates);

        let href = collection.href();
        collection.add_action(
            ACTION_CREATE,
            ActionDef::new("Create", ActionMethod::Post).with_href(&href),
        );
        collection.add_action(
            ACTION_FILTER,
            ActionDef::new("Filter", ActionMethod::Get).with_href(&href),
        );
        collection.refresh_page_links();

        Ok(collection)
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Invoke a named action on a resource.
    ///
    /// - `get` returns the resource unchanged
    /// - `delete` deletes it and returns `None`
    /// - `update` merges a non-empty payload as `update` does
    /// - any other action merges the payload and applies the transition
    ///   defined for the current status, if there is one
    ///
    /// # Errors
    ///
    /// - `NotFound` if the resource is absent
    /// - `InvalidAction` unless the action is in the current computed action set
    /// - `InvalidTransition` if the machine has no transition for a governed action
    /// - `ValidationError` for an empty `update` payload
    /// - `Conflict` if a governed payload carries `status`
    pub fn perform_action(
        &mut self,
        resource_type: &str,
        id: &str,
        action: &str,
        payload: Properties,
    ) -> Result<Option<Resource>, AffordanceError> {
        let mut data = self.load(resource_type, id)?;
        let stored = StoredResource::new(resource_type, id, data.clone());

        let resource = self.enhancer().enhance(&stored);
        if !resource.has_action(action) {
            return Err(AffordanceError::InvalidAction {
                resource_type: resource_type.to_string(),
                action: action.to_string(),
            });
        }

        match action {
            ACTION_GET => Ok(Some(resource)),
            ACTION_DELETE => {
                self.delete(resource_type, id)?;
                Ok(None)
            }
            ACTION_UPDATE => {
                if payload.is_empty() {
                    return Err(AffordanceError::ValidationError(
                        "update requires a non-empty payload".to_string(),
                    ));
                }
                self.update(resource_type, id, payload).map(Some)
            }
            _ => {
                self.reject_status_write(resource_type, &payload)?;
                validate_caller_bag(&payload)?;
                merge(&mut data, payload);

                if let Some(machine) = self.machines.get(resource_type)
                    && let Some(status) = stored.status()
                    && !machine.allowed_actions(status).contains_key(action)
                {
                    let to = machine.transition(status, action)?.to_string();
                    record_transition(&mut data, status.to_string(), to, action)?;
                }

                self.storage.update(resource_type, id, &data)?;
                tracing::debug!(resource_type, id, action, "performed action");
                Ok(Some(self.build(resource_type, id, data)))
            }
        }
    }

    // =========================================================================
    // STORED LINKS
    // =========================================================================

    /// Links persisted on a resource by navigation.
    pub(crate) fn stored_links(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<Link>, AffordanceError> {
        let data = self.load(resource_type, id)?;
        Ok(StoredResource::new(resource_type, id, data).stored_links())
    }

    /// Replace the links persisted on a resource.
    pub(crate) fn replace_stored_links(
        &mut self,
        resource_type: &str,
        id: &str,
        links: &[Link],
    ) -> Result<(), AffordanceError> {
        let mut data = self.load(resource_type, id)?;
        if links.is_empty() {
            data.remove(STORED_LINKS_KEY);
        } else {
            let encoded = serde_json::to_value(links)
                .map_err(|e| AffordanceError::SerializationError(e.to_string()))?;
            data.insert(STORED_LINKS_KEY.to_string(), encoded);
        }
        data.insert(UPDATED_AT_KEY.to_string(), Value::String(timestamp()));
        self.storage.update(resource_type, id, &data)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn load(&self, resource_type: &str, id: &str) -> Result<Properties, AffordanceError> {
        self.storage
            .get(resource_type, id)?
            .ok_or_else(|| AffordanceError::not_found(resource_type, id))
    }

    fn reject_status_write(
        &self,
        resource_type: &str,
        updates: &Properties,
    ) -> Result<(), AffordanceError> {
        if self.machines.is_governed(resource_type) && updates.contains_key(STATUS_KEY) {
            return Err(AffordanceError::Conflict(format!(
                "status of '{}' changes only through its state machine",
                resource_type
            )));
        }
        Ok(())
    }
}

// =============================================================================
// BAG HELPERS
// =============================================================================

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Shallow merge that keeps identity and creation time, then restamps `updatedAt`.
fn merge(data: &mut Properties, updates: Properties) {
    for (key, value) in updates {
        if key == ID_KEY || key == CREATED_AT_KEY {
            continue;
        }
        data.insert(key, value);
    }
    data.insert(UPDATED_AT_KEY.to_string(), Value::String(timestamp()));
}

fn record_transition(
    data: &mut Properties,
    from: String,
    to: String,
    action: &str,
) -> Result<(), AffordanceError> {
    let change = StatusChange {
        from,
        to: to.clone(),
        timestamp: timestamp(),
        action: action.to_string(),
    };
    let entry = serde_json::to_value(change)
        .map_err(|e| AffordanceError::SerializationError(e.to_string()))?;

    match data.get_mut(STATUS_HISTORY_KEY) {
        Some(Value::Array(history)) => history.push(entry),
        _ => {
            data.insert(STATUS_HISTORY_KEY.to_string(), Value::Array(vec![entry]));
        }
    }
    data.insert(STATUS_KEY.to_string(), Value::String(to));
    Ok(())
}

/// Check a type or id before it becomes a URI segment and storage key.
fn validate_segment(kind: &str, value: &str, max_len: usize) -> Result<(), AffordanceError> {
    if value.is_empty() {
        return Err(AffordanceError::ValidationError(format!(
            "{} must be non-empty",
            kind
        )));
    }
    if value.len() > max_len {
        return Err(AffordanceError::ValidationError(format!(
            "{} exceeds {} bytes",
            kind, max_len
        )));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || FORBIDDEN_SEGMENT_CHARS.contains(&c))
    {
        return Err(AffordanceError::ValidationError(format!(
            "{} '{}' contains a reserved character",
            kind, value
        )));
    }
    Ok(())
}

/// Check a caller-supplied bag at the storage boundary.
fn validate_caller_bag(data: &Properties) -> Result<(), AffordanceError> {
    for key in data.keys() {
        if key.is_empty() {
            return Err(AffordanceError::ValidationError(
                "property keys must be non-empty".to_string(),
            ));
        }
        if key.len() > MAX_PROPERTY_KEY_LENGTH {
            return Err(AffordanceError::ValidationError(format!(
                "property key exceeds {} bytes",
                MAX_PROPERTY_KEY_LENGTH
            )));
        }
        if INTERNAL_KEYS.contains(&key.as_str()) {
            return Err(AffordanceError::ValidationError(format!(
                "'{}' is reserved for engine use",
                key
            )));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn bag(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => Properties::new(),
        }
    }

    fn task_store() -> Store<MemoryStorage> {
        let mut store = Store::new(MemoryStorage::new());
        store
            .register_state_machine(
                "task",
                StateMachineDefinition::new("pending")
                    .with_transition("pending", "start", "inProgress")
                    .with_transition("inProgress", "complete", "completed"),
            )
            .expect("register");
        store
    }

    #[test]
    fn create_assigns_id_and_timestamps() {
        let mut store = Store::new(MemoryStorage::new());
        let note = store
            .create("note", bag(json!({"text": "hello"})))
            .expect("create");

        assert!(Uuid::parse_str(note.id()).is_ok());
        assert!(note.property_str(CREATED_AT_KEY).is_some());
        assert_eq!(
            note.property(CREATED_AT_KEY),
            note.property(UPDATED_AT_KEY)
        );
        assert!(note.property(ID_KEY).is_none());
    }

    #[test]
    fn create_uses_supplied_id_and_rejects_duplicates() {
        let mut store = Store::new(MemoryStorage::new());
        let note = store
            .create("note", bag(json!({"id": "n1"})))
            .expect("create");
        assert_eq!(note.id(), "n1");

        let err = store
            .create("note", bag(json!({"id": "n1"})))
            .expect_err("duplicate");
        assert!(matches!(err, AffordanceError::Conflict(_)));
    }

    #[test]
    fn create_rejects_bad_identity() {
        let mut store = Store::new(MemoryStorage::new());
        for data in [
            json!({"id": ""}),
            json!({"id": "a/b"}),
            json!({"id": "has space"}),
            json!({"id": 42}),
        ] {
            assert!(matches!(
                store.create("note", bag(data)),
                Err(AffordanceError::ValidationError(_))
            ));
        }
        assert!(store.create("", Properties::new()).is_err());
        assert!(matches!(
            store.create("note", bag(json!({"_links": []}))),
            Err(AffordanceError::ValidationError(_))
        ));
    }

    #[test]
    fn governed_create_forces_initial_status() {
        let mut store = task_store();
        let task = store
            .create("task", bag(json!({"status": "completed"})))
            .expect("create");
        assert_eq!(task.property_str(STATUS_KEY), Some("pending"));
    }

    #[test]
    fn update_preserves_identity_and_creation_time() {
        let mut store = Store::new(MemoryStorage::new());
        let note = store
            .create("note", bag(json!({"id": "n1", "text": "a"})))
            .expect("create");
        let created = note.property(CREATED_AT_KEY).cloned();

        let updated = store
            .update(
                "note",
                "n1",
                bag(json!({"text": "b", "createdAt": "never", "id": "other"})),
            )
            .expect("update");
        assert_eq!(updated.id(), "n1");
        assert_eq!(updated.property_str("text"), Some("b"));
        assert_eq!(updated.property(CREATED_AT_KEY).cloned(), created);
    }

    #[test]
    fn update_missing_is_not_found() {
        let mut store = Store::new(MemoryStorage::new());
        let err = store
            .update("note", "ghost", Properties::new())
            .expect_err("missing");
        assert!(matches!(err, AffordanceError::NotFound { .. }));
    }

    #[test]
    fn governed_update_with_status_conflicts() {
        let mut store = task_store();
        let task = store.create("task", Properties::new()).expect("create");

        let err = store
            .update("task", task.id(), bag(json!({"status": "completed"})))
            .expect_err("conflict");
        assert!(matches!(err, AffordanceError::Conflict(_)));

        let reloaded = store.get("task", task.id()).expect("get").expect("present");
        assert_eq!(reloaded.property_str(STATUS_KEY), Some("pending"));
    }

    #[test]
    fn ungoverned_update_may_set_status() {
        let mut store = Store::new(MemoryStorage::new());
        store
            .create("note", bag(json!({"id": "n1"})))
            .expect("create");
        let note = store
            .update("note", "n1", bag(json!({"status": "archived"})))
            .expect("update");
        assert_eq!(note.property_str(STATUS_KEY), Some("archived"));
    }

    #[test]
    fn transition_records_history() {
        let mut store = task_store();
        let task = store.create("task", Properties::new()).expect("create");

        let task = store
            .perform_action("task", task.id(), "start", bag(json!({"assignee": "ana"})))
            .expect("start")
            .expect("resource");
        let state = task.state().expect("state");
        assert_eq!(state.current, "inProgress");
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].from, "pending");
        assert_eq!(state.history[0].action, "start");
        assert_eq!(task.property_str("assignee"), Some("ana"));
    }

    #[test]
    fn unavailable_action_is_invalid() {
        let mut store = task_store();
        let task = store.create("task", Properties::new()).expect("create");
        let err = store
            .perform_action("task", task.id(), "complete", Properties::new())
            .expect_err("not yet");
        assert!(matches!(err, AffordanceError::InvalidAction { .. }));
    }

    #[test]
    fn reserved_actions() {
        let mut store = task_store();
        let task = store.create("task", Properties::new()).expect("create");
        let id = task.id().to_string();

        let got = store
            .perform_action("task", &id, "get", Properties::new())
            .expect("get");
        assert_eq!(got.as_ref().map(Resource::id), Some(id.as_str()));

        assert!(matches!(
            store.perform_action("task", &id, "update", Properties::new()),
            Err(AffordanceError::ValidationError(_))
        ));

        let deleted = store
            .perform_action("task", &id, "delete", Properties::new())
            .expect("delete");
        assert!(deleted.is_none());
        assert!(store.get("task", &id).expect("get").is_none());
    }

    #[test]
    fn unknown_stored_status_offers_only_default_actions() {
        let mut store = task_store();
        let mut data = bag(json!({"status": "lost"}));
        data.insert(CREATED_AT_KEY.into(), json!("2024-01-01T00:00:00Z"));
        store.storage_mut().create("task", "t1", &data).expect("seed");

        for action in ["start", "launch"] {
            let err = store
                .perform_action("task", "t1", action, Properties::new())
                .expect_err("not offered");
            assert!(matches!(err, AffordanceError::InvalidAction { .. }));
        }
        assert!(store
            .perform_action("task", "t1", "get", Properties::new())
            .expect("get")
            .is_some());
    }

    #[test]
    fn replaced_machine_reports_unknown_actions_as_invalid_action() {
        let mut store = task_store();
        let task = store.create("task", Properties::new()).expect("create");
        let id = task.id().to_string();
        store
            .perform_action("task", &id, "start", Properties::new())
            .expect("start");

        store
            .register_state_machine(
                "task",
                StateMachineDefinition::new("pending")
                    .with_transition("pending", "skip", "done"),
            )
            .expect("replace");

        let reloaded = store.get("task", &id).expect("get").expect("present");
        let actions: Vec<_> = reloaded.actions().keys().map(String::as_str).collect();
        assert_eq!(actions, vec!["delete", "get", "update"]);

        let err = store
            .perform_action("task", &id, "launch", Properties::new())
            .expect_err("unknown action");
        assert!(matches!(err, AffordanceError::InvalidAction { .. }));
    }

    #[test]
    fn update_action_merges_payload() {
        let mut store = task_store();
        let task = store
            .create("task", bag(json!({"title": "draft"})))
            .expect("create");
        let id = task.id().to_string();

        let updated = store
            .perform_action("task", &id, "update", bag(json!({"title": "final", "owner": "ada"})))
            .expect("update")
            .expect("resource");
        assert_eq!(updated.property_str("title"), Some("final"));
        assert_eq!(updated.property_str("owner"), Some("ada"));
        assert_eq!(updated.property_str(STATUS_KEY), Some("pending"));
        assert_eq!(updated.property(CREATED_AT_KEY), task.property(CREATED_AT_KEY));
    }

    #[test]
    fn update_action_cannot_write_status() {
        let mut store = task_store();
        let task = store.create("task", Properties::new()).expect("create");

        let err = store
            .perform_action("task", task.id(), "update", bag(json!({"status": "completed"})))
            .expect_err("status write");
        assert!(matches!(err, AffordanceError::Conflict(_)));
        let stored = store.get("task", task.id()).expect("get").expect("present");
        assert_eq!(stored.property_str(STATUS_KEY), Some("pending"));
    }

    #[test]
    fn allowed_action_merges_without_history() {
        let mut store = Store::new(MemoryStorage::new());
        store
            .register_state_machine(
                "task",
                StateMachineDefinition::new("inProgress")
                    .with_transition("inProgress", "complete", "completed")
                    .with_allowed_action(
                        "inProgress",
                        "comment",
                        ActionDef::new("Comment", ActionMethod::Post)
                            .with_description("Leave a note")
                            .with_fields(["text"]),
                    ),
            )
            .expect("register");

        let stale = "2024-01-01T00:00:00.000Z";
        let data = bag(json!({
            "status": "inProgress",
            "createdAt": stale,
            "updatedAt": stale,
        }));
        store.storage_mut().create("task", "t1", &data).expect("seed");

        let before = store.get("task", "t1").expect("get").expect("present");
        let comment = before.action("comment").expect("comment action");
        assert_eq!(comment.description.as_deref(), Some("Leave a note"));

        let after = store
            .perform_action("task", "t1", "comment", bag(json!({"text": "halfway"})))
            .expect("comment")
            .expect("resource");
        assert_eq!(after.property_str("text"), Some("halfway"));
        assert_eq!(after.property_str(STATUS_KEY), Some("inProgress"));
        assert_eq!(after.property_str(CREATED_AT_KEY), Some(stale));
        assert_ne!(after.property_str(UPDATED_AT_KEY), Some(stale));
        let state = after.state().expect("governed");
        assert!(state.history.is_empty());
    }

    #[test]
    fn collection_clamps_page_size_and_aggregates() {
        let mut config = EngineConfig::default();
        config.collection.max_page_size = 2;
        config.collection.default_page_size = 2;
        let mut store = Store::from_config(MemoryStorage::new(), &config).expect("store");
        for i in 0..5 {
            store
                .create("widget", bag(json!({"id": format!("w{}", i), "status": "ok"})))
                .expect("create");
        }

        let page = store
            .get_collection("widget", &CollectionQuery::page(0, 50))
            .expect("collection");
        assert_eq!(page.pagination().page, 1);
        assert_eq!(page.pagination().page_size, 2);
        assert_eq!(page.pagination().total_pages, 3);
        assert_eq!(page.len(), 2);
        let aggregates = page.aggregates().expect("aggregates");
        assert_eq!(aggregates["count"], 5);
        assert_eq!(aggregates["byStatus"]["ok"], 2);
        assert!(page.actions().contains_key("create"));
        assert!(page.link("next").is_some());

        assert!(matches!(
            store.get_collection("widget", &CollectionQuery::page(1, 0)),
            Err(AffordanceError::ValidationError(_))
        ));
    }

    #[test]
    fn stored_links_round_trip() {
        let mut store = Store::new(MemoryStorage::new());
        store
            .create("note", bag(json!({"id": "n1"})))
            .expect("create");
        let links = vec![Link::to_resource("topic", "topic", "t1")];
        store
            .replace_stored_links("note", "n1", &links)
            .expect("write links");
        assert_eq!(store.stored_links("note", "n1").expect("links"), links);

        store.replace_stored_links("note", "n1", &[]).expect("clear");
        let note = store.get("note", "n1").expect("get").expect("present");
        assert_eq!(note.links().len(), 1);
    }
}
