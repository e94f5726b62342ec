//! # Engine Primitives
//!
//! Hardcoded constants for the Affordance engine.
//!
//! These are compiled into the binary and immutable at runtime. Values that
//! deployments tune (page sizes, graph depth) are defaults that
//! `EngineConfig` may override within the hard limits defined here.

// =============================================================================
// RESERVED PROPERTIES
// =============================================================================

/// Property holding the state-machine status of a governed resource.
pub const STATUS_KEY: &str = "status";

/// Property stamped once when a resource is created.
pub const CREATED_AT_KEY: &str = "createdAt";

/// Property stamped on every write.
pub const UPDATED_AT_KEY: &str = "updatedAt";

/// Internal property holding the list of transition records.
///
/// Persisted with the bag, hidden from the `properties` view.
pub const STATUS_HISTORY_KEY: &str = "_statusHistory";

/// Internal property holding navigation links written by `Navigator::link`.
///
/// Persisted with the bag, hidden from the `properties` view.
pub const STORED_LINKS_KEY: &str = "_links";

/// Properties callers may never write directly.
pub const INTERNAL_KEYS: [&str; 2] = [STATUS_HISTORY_KEY, STORED_LINKS_KEY];

// =============================================================================
// ACTIONS & RELATIONS
// =============================================================================

/// Default resource actions attached to every resource.
pub const ACTION_GET: &str = "get";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_DELETE: &str = "delete";

/// Default collection-level actions.
pub const ACTION_CREATE: &str = "create";
pub const ACTION_FILTER: &str = "filter";

/// Names a state machine may not use for transitions or allowed actions.
pub const RESERVED_ACTIONS: [&str; 3] = [ACTION_GET, ACTION_UPDATE, ACTION_DELETE];

/// The relation every resource carries to itself.
pub const SELF_REL: &str = "self";

/// Identifier suffixes that turn a property into a relationship link.
///
/// `customerId` and `customer_id` both relate to type `customer`.
pub const IDENTIFIER_SUFFIXES: [&str; 2] = ["Id", "_id"];

// =============================================================================
// PAGINATION
// =============================================================================

/// Page size used when a collection request does not name one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size a collection request may ask for.
pub const MAX_PAGE_SIZE: usize = 1000;

// =============================================================================
// GRAPH
// =============================================================================

/// Default depth cap for `create_graph`.
pub const DEFAULT_GRAPH_DEPTH: usize = 10;

/// Hard depth cap for `create_graph`.
///
/// All graph builds must be computationally bounded.
pub const MAX_GRAPH_DEPTH: usize = 100;

/// Properties copied onto graph nodes by default.
pub const DEFAULT_SUMMARY_PROPERTIES: [&str; 4] = ["name", "title", "label", STATUS_KEY];

/// Properties tried in order when labelling a graph node.
pub const LABEL_PROPERTIES: [&str; 3] = ["name", "title", "label"];

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for resource type names.
pub const MAX_TYPE_LENGTH: usize = 128;

/// Maximum length for resource identifiers.
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum length for property keys.
pub const MAX_PROPERTY_KEY_LENGTH: usize = 256;

/// Characters that may not appear in a type or id, since both form URI segments.
pub const FORBIDDEN_SEGMENT_CHARS: [char; 5] = ['/', '?', '&', '#', '='];
