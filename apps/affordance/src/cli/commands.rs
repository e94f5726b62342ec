//! # CLI Command Implementations
//!
//! Every command returns the JSON it wants printed.

use super::{Backend, Cli};
use affordance_core::{
    AffordanceError, EngineConfig, Navigator, Properties, Resource, ResourceUri, Store,
    StorageBackend,
};
use serde_json::{Value, json};
use std::path::Path;

type CliStore = Store<StorageBackend>;

// =============================================================================
// HELPERS
// =============================================================================

/// Open the store the global flags describe.
pub fn open_store(cli: &Cli) -> Result<CliStore, AffordanceError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let storage = match cli.backend {
        Backend::Memory => StorageBackend::default(),
        Backend::Redb => StorageBackend::redb(&cli.database)?,
    };
    Store::from_config(storage, &config)
}

/// Parse a `--data` argument into a property bag. Absent means empty.
pub fn parse_payload(data: Option<&str>) -> Result<Properties, AffordanceError> {
    let Some(raw) = data else {
        return Ok(Properties::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AffordanceError::ValidationError(format!(
            "payload must be a JSON object, got {}",
            other
        ))),
        Err(e) => Err(AffordanceError::ValidationError(format!(
            "payload is not valid JSON: {}",
            e
        ))),
    }
}

/// Split a resource URI into `(type, id)`, rejecting collection URIs.
fn resource_address(uri: &str) -> Result<(String, String), AffordanceError> {
    let parsed = ResourceUri::parse(uri)?;
    match parsed.id {
        Some(id) => Ok((parsed.resource_type, id)),
        None => Err(AffordanceError::InvalidUri(format!(
            "'{}' names a collection, expected /type/id",
            uri
        ))),
    }
}

fn resources_json(resources: Vec<Resource>) -> Result<Value, AffordanceError> {
    resources
        .iter()
        .map(Resource::to_json)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

// =============================================================================
// PROTOCOL VERBS
// =============================================================================

/// Read a resource or collection page.
pub fn cmd_explore(store: &CliStore, uri: &str) -> Result<Value, AffordanceError> {
    store.explore(uri)?.to_json()
}

/// Invoke an action.
pub fn cmd_act(
    store: &mut CliStore,
    uri: &str,
    action: &str,
    data: Option<&str>,
) -> Result<Value, AffordanceError> {
    let payload = parse_payload(data)?;
    match store.act(uri, action, payload)? {
        Some(resource) => resource.to_json(),
        None => Ok(json!({ "deleted": uri })),
    }
}

/// Create a resource.
pub fn cmd_create(
    store: &mut CliStore,
    uri: &str,
    data: Option<&str>,
) -> Result<Value, AffordanceError> {
    let payload = parse_payload(data)?;
    let resource = store.create_at(uri, payload)?;
    tracing::info!(href = %resource.href(), "created resource");
    resource.to_json()
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// Link two resources.
pub fn cmd_link(
    store: &mut CliStore,
    source: &str,
    target: &str,
    rel: &str,
    back_rel: &str,
) -> Result<Value, AffordanceError> {
    let (src_type, src_id) = resource_address(source)?;
    let (dst_type, dst_id) = resource_address(target)?;
    Navigator::new(store)
        .link(&src_type, &src_id, &dst_type, &dst_id, rel, back_rel)?
        .to_json()
}

/// Unlink two resources.
pub fn cmd_unlink(
    store: &mut CliStore,
    source: &str,
    target: &str,
    rel: &str,
    back_rel: &str,
) -> Result<Value, AffordanceError> {
    let (src_type, src_id) = resource_address(source)?;
    let (dst_type, dst_id) = resource_address(target)?;
    Navigator::new(store)
        .unlink(&src_type, &src_id, &dst_type, &dst_id, rel, back_rel)?
        .to_json()
}

/// Resources linking to a resource.
pub fn cmd_referencing(
    store: &mut CliStore,
    uri: &str,
    relation: Option<&str>,
) -> Result<Value, AffordanceError> {
    let (resource_type, id) = resource_address(uri)?;
    let found = Navigator::new(store).find_referencing(&resource_type, &id, relation)?;
    resources_json(found)
}

/// Graph around a seed resource.
pub fn cmd_graph(
    store: &mut CliStore,
    uri: &str,
    depth: usize,
    relations: &[String],
) -> Result<Value, AffordanceError> {
    let (resource_type, id) = resource_address(uri)?;
    let allowed: Vec<&str> = relations.iter().map(String::as_str).collect();
    let filter = (!allowed.is_empty()).then_some(allowed.as_slice());

    let graph = Navigator::new(store).create_graph(&resource_type, &id, depth, filter)?;
    serde_json::to_value(graph).map_err(|e| AffordanceError::SerializationError(e.to_string()))
}

// =============================================================================
// INTROSPECTION
// =============================================================================

/// Stored resource types.
pub fn cmd_types(store: &CliStore) -> Result<Value, AffordanceError> {
    Ok(json!(store.list_types()?))
}

/// Configured state machine definitions, keyed by type.
pub fn cmd_machines(store: &CliStore) -> Result<Value, AffordanceError> {
    let machines = store.machines();
    let mut out = serde_json::Map::new();
    for resource_type in machines.types() {
        if let Some(machine) = machines.get(resource_type) {
            let definition = serde_json::to_value(machine.definition())
                .map_err(|e| AffordanceError::SerializationError(e.to_string()))?;
            out.insert(resource_type.to_string(), definition);
        }
    }
    Ok(Value::Object(out))
}

/// Compact the database file.
pub fn cmd_compact(store: &mut CliStore) -> Result<Value, AffordanceError> {
    let reclaimed = store.storage_mut().compact()?;
    tracing::info!(reclaimed, "compacted storage");
    Ok(json!({ "compacted": reclaimed }))
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db_path: &Path, backend: Backend, force: bool) -> Result<Value, AffordanceError> {
    if backend == Backend::Memory {
        return Ok(json!({ "backend": "memory", "initialized": false }));
    }

    if db_path.exists() {
        if !force {
            return Err(AffordanceError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path).map_err(|e| {
            AffordanceError::IoError(format!("Cannot remove '{}': {}", db_path.display(), e))
        })?;
    }

    StorageBackend::redb(db_path)?;
    tracing::info!(path = %db_path.display(), "initialized database");
    Ok(json!({
        "backend": "redb",
        "database": db_path.to_string_lossy(),
        "initialized": true
    }))
}
