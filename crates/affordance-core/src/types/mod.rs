//! # Core Type Definitions
//!
//! This module contains the shared types of the Affordance resource engine:
//! - The open-schema property bag (`Properties`)
//! - Hypermedia affordances (`ActionDef`, `ActionMethod`, `Link`, `Prompt`, `Relationship`)
//! - Error types (`AffordanceError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! Property bags keep insertion order (`serde_json` with `preserve_order`).
//! Every computed map elsewhere in the crate is a `BTreeMap`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// PROPERTY BAG
// =============================================================================

/// Ordered mapping from property name to a JSON value.
///
/// Values are the closed kind string | number | bool | null | map | list.
/// Validation happens at the storage boundary, not here.
pub type Properties = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// ACTIONS
// =============================================================================

/// Method hint advertised with an action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

/// Descriptor of a named operation a client may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionDef {
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Method hint for transports that care.
    #[serde(default)]
    pub method: ActionMethod,
    /// Target of the action. Filled with the resource href when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Payload fields the action expects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ActionDef {
    /// Create an action descriptor with a title and method.
    #[must_use]
    pub fn new(title: impl Into<String>, method: ActionMethod) -> Self {
        Self {
            title: title.into(),
            method,
            ..Self::default()
        }
    }

    /// Set the target href.
    #[must_use]
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the expected payload fields.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

// =============================================================================
// LINKS & RELATIONSHIPS
// =============================================================================

/// A typed, directional relation from one resource to another resource or collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Resource type of the target, when known.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

impl Link {
    /// Create a link with just a relation and href.
    #[must_use]
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            title: None,
            resource_type: None,
        }
    }

    /// Create a link to a single resource, carrying its type.
    #[must_use]
    pub fn to_resource(rel: impl Into<String>, resource_type: &str, id: &str) -> Self {
        Self {
            rel: rel.into(),
            href: resource_href(resource_type, id),
            title: None,
            resource_type: Some(resource_type.to_string()),
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Split the href into `(type, id)` when it addresses a single resource.
    ///
    /// Collection hrefs (`/type`, `/type?page=2`) return `None`.
    #[must_use]
    pub fn target(&self) -> Option<(&str, &str)> {
        let path = self.href.split('?').next()?;
        let mut segments = path.strip_prefix('/')?.split('/');
        let resource_type = segments.next().filter(|s| !s.is_empty())?;
        let id = segments.next().filter(|s| !s.is_empty())?;
        if segments.next().is_some() {
            return None;
        }
        Some((resource_type, id))
    }
}

/// Canonical href of a single resource.
#[must_use]
pub fn resource_href(resource_type: &str, id: &str) -> String {
    format!("/{}/{}", resource_type, id)
}

/// Named relation to another resource, derived from identifier properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

// =============================================================================
// PROMPTS
// =============================================================================

/// A suggested follow-up offered alongside a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    /// Action the prompt leads to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Prompt {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: None,
        }
    }

    #[must_use]
    pub fn for_action(text: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: Some(action.into()),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse error classification for protocol collaborators.
///
/// Transports map these onto status codes or RPC error envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidAction,
    InvalidTransition,
    Validation,
    Conflict,
    Internal,
}

/// Errors that can occur in the Affordance engine.
///
/// - No silent failures
/// - Use `Result<T, AffordanceError>` for fallible operations
/// - The engine never retries; retries belong to the storage collaborator
#[derive(Debug, Error)]
pub enum AffordanceError {
    /// The resource (or link target) does not exist.
    #[error("Resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// The action is unknown or unavailable in the current computed action set.
    #[error("Action '{action}' is not available on {resource_type}")]
    InvalidAction {
        resource_type: String,
        action: String,
    },

    /// The governing state machine prohibits the status change.
    #[error("Transition '{action}' is not permitted from state '{from}'")]
    InvalidTransition { from: String, action: String },

    /// A required payload is missing or a property bag is malformed.
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// A direct mutation conflicts with engine-managed state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A state machine definition is inconsistent.
    #[error("Invalid state machine definition: {0}")]
    InvalidDefinition(String),

    /// A collection received an item of the wrong type.
    #[error("Collection of '{expected}' cannot hold a '{found}'")]
    InvalidItemType { expected: String, found: String },

    /// A resource URI could not be parsed.
    #[error("Invalid resource URI: {0}")]
    InvalidUri(String),

    /// The engine configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage backend error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl AffordanceError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Classify the error for protocol collaborators.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidAction { .. } => ErrorKind::InvalidAction,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::ValidationError(_)
            | Self::InvalidItemType { .. }
            | Self::InvalidUri(_)
            | Self::InvalidDefinition(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Config(_) | Self::SerializationError(_) | Self::IoError(_) => {
                ErrorKind::Internal
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
