//! # Resource
//!
//! The resource value object: identity, properties and the computed
//! hypermedia affordances (actions, state, relationships, presentation,
//! prompts, links).
//!
//! A `Resource` is a view. The store rebuilds it from the stored property bag
//! on every load, so nothing here is persisted except `properties`.

use crate::primitives::SELF_REL;
use crate::state_machine::Transition;
use crate::types::{
    ActionDef, AffordanceError, Link, Prompt, Properties, Relationship, resource_href,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// STATE
// =============================================================================

/// One recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: String,
    pub to: String,
    /// RFC 3339 timestamp of the change.
    pub timestamp: String,
    /// Action that triggered the change.
    pub action: String,
}

/// State-machine view of a governed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    /// Current status.
    pub current: String,
    /// Description of the current state, if the definition has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Transitions available from the current status.
    #[serde(default)]
    pub allowed_transitions: Vec<Transition>,
    /// Status changes, oldest first.
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

// =============================================================================
// RESOURCE
// =============================================================================

/// A typed resource with identity, properties and computed affordances.
///
/// Serializes to the transfer representation: `id`, `type` and `properties`
/// always; every other section only when non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    id: String,
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    properties: Properties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    actions: BTreeMap<String, ActionDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<ResourceState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    relationships: BTreeMap<String, Relationship>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    presentation: Properties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    prompts: Vec<Prompt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    links: Vec<Link>,
}

impl Resource {
    /// Create an empty resource. The `self` link is added immediately.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        let id = id.into();
        let self_link = Link::to_resource(SELF_REL, &resource_type, &id);
        Self {
            id,
            resource_type,
            properties: Properties::new(),
            actions: BTreeMap::new(),
            state: None,
            relationships: BTreeMap::new(),
            presentation: Properties::new(),
            prompts: Vec::new(),
            links: vec![self_link],
        }
    }

    /// Create a resource with an initial property bag.
    #[must_use]
    pub fn with_properties(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        properties: Properties,
    ) -> Self {
        let mut resource = Self::new(resource_type, id);
        resource.properties = properties;
        resource
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Canonical href: `/{type}/{id}`.
    #[must_use]
    pub fn href(&self) -> String {
        resource_href(&self.resource_type, &self.id)
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Get a property as a string slice, if it is a string.
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Add or replace an action.
    pub fn add_action(&mut self, name: impl Into<String>, action: ActionDef) {
        self.actions.insert(name.into(), action);
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionDef> {
        self.actions.get(name)
    }

    #[must_use]
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    #[must_use]
    pub fn actions(&self) -> &BTreeMap<String, ActionDef> {
        &self.actions
    }

    // =========================================================================
    // STATE
    // =========================================================================

    pub fn set_state(&mut self, state: ResourceState) {
        self.state = Some(state);
    }

    #[must_use]
    pub fn state(&self) -> Option<&ResourceState> {
        self.state.as_ref()
    }

    // =========================================================================
    // RELATIONSHIPS
    // =========================================================================

    pub fn add_relationship(&mut self, name: impl Into<String>, relationship: Relationship) {
        self.relationships.insert(name.into(), relationship);
    }

    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    #[must_use]
    pub fn relationships(&self) -> &BTreeMap<String, Relationship> {
        &self.relationships
    }

    // =========================================================================
    // PRESENTATION
    // =========================================================================

    /// Replace all presentation hints.
    pub fn set_presentation(&mut self, hints: Properties) {
        self.presentation = hints;
    }

    /// Merge hints over the existing ones; later keys win.
    pub fn merge_presentation(&mut self, hints: &Properties) {
        for (key, value) in hints {
            self.presentation.insert(key.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn presentation(&self) -> &Properties {
        &self.presentation
    }

    // =========================================================================
    // PROMPTS
    // =========================================================================

    pub fn add_prompt(&mut self, prompt: Prompt) {
        self.prompts.push(prompt);
    }

    #[must_use]
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    // =========================================================================
    // LINKS
    // =========================================================================

    /// Add a link. Returns `false` (and does nothing) if `(rel, href)` is already present.
    pub fn add_link(&mut self, link: Link) -> bool {
        if self.has_link(&link.rel, &link.href) {
            return false;
        }
        self.links.push(link);
        true
    }

    #[must_use]
    pub fn has_link(&self, rel: &str, href: &str) -> bool {
        self.links.iter().any(|l| l.rel == rel && l.href == href)
    }

    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// First link with the given relation.
    #[must_use]
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// All links with the given relation, in order.
    pub fn links_by_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.rel == rel)
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Serialize to the transfer representation.
    pub fn to_json(&self) -> Result<Value, AffordanceError> {
        serde_json::to_value(self).map_err(|e| AffordanceError::SerializationError(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
