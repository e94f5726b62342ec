//! # Enhancement Pipeline
//!
//! Derives the hypermedia view of a resource from its stored property bag.
//!
//! `Enhancer::enhance` is a pure function of the stored bag and the engine
//! configuration. It runs a fixed sequence of stages:
//!
//! 1. Standard actions (`get`, `update`, `delete`)
//! 2. State-machine actions and the `state` section
//! 3. Relationship links from identifier properties, then stored links
//! 4. Presentation hints
//! 5. Conversation prompts
//!
//! Running it twice on the same bag yields equal resources.

use crate::config::{PresentationRule, PromptRule};
use crate::primitives::{
    ACTION_DELETE, ACTION_GET, ACTION_UPDATE, FORBIDDEN_SEGMENT_CHARS, IDENTIFIER_SUFFIXES,
    INTERNAL_KEYS, STATUS_KEY, STATUS_HISTORY_KEY, STORED_LINKS_KEY,
};
use crate::resource::{Resource, ResourceState, StatusChange};
use crate::state_machine::MachineRegistry;
use crate::types::{ActionDef, ActionMethod, Link, Prompt, Properties, Relationship};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// STORED FORM
// =============================================================================

/// A resource exactly as it sits in storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResource {
    pub resource_type: String,
    pub id: String,
    /// The persisted bag, including internal keys.
    pub properties: Properties,
}

impl StoredResource {
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            properties,
        }
    }

    /// Current status, if the bag carries a string one.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.properties.get(STATUS_KEY).and_then(Value::as_str)
    }

    /// Transition records persisted with the bag, oldest first.
    ///
    /// A malformed history is dropped with a warning rather than failing the load.
    #[must_use]
    pub fn history(&self) -> Vec<StatusChange> {
        decode_list(&self.properties, STATUS_HISTORY_KEY, &self.resource_type, &self.id)
    }

    /// Navigation links persisted with the bag.
    #[must_use]
    pub fn stored_links(&self) -> Vec<Link> {
        decode_list(&self.properties, STORED_LINKS_KEY, &self.resource_type, &self.id)
    }

    /// The bag without internal keys.
    #[must_use]
    pub fn visible_properties(&self) -> Properties {
        self.properties
            .iter()
            .filter(|(key, _)| !INTERNAL_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(
    properties: &Properties,
    key: &str,
    resource_type: &str,
    id: &str,
) -> Vec<T> {
    let Some(raw) = properties.get(key) else {
        return Vec::new();
    };
    match serde_json::from_value(raw.clone()) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!(resource_type, id, key, error = %e, "ignoring malformed internal property");
            Vec::new()
        }
    }
}

/// Resource type named by an identifier property, e.g. `customerId` -> `customer`.
///
/// The key must be longer than the suffix.
#[must_use]
pub fn related_type(key: &str) -> Option<&str> {
    IDENTIFIER_SUFFIXES
        .iter()
        .find_map(|suffix| key.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
}

// =============================================================================
// ENHANCER
// =============================================================================

/// Runs the enhancement pipeline against borrowed engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct Enhancer<'a> {
    machines: &'a MachineRegistry,
    presentation: &'a BTreeMap<String, PresentationRule>,
    prompts: &'a BTreeMap<String, Vec<PromptRule>>,
}

impl<'a> Enhancer<'a> {
    #[must_use]
    pub fn new(
        machines: &'a MachineRegistry,
        presentation: &'a BTreeMap<String, PresentationRule>,
        prompts: &'a BTreeMap<String, Vec<PromptRule>>,
    ) -> Self {
        Self {
            machines,
            presentation,
            prompts,
        }
    }

    /// Build the full resource view of a stored bag.
    #[must_use]
    pub fn enhance(&self, stored: &StoredResource) -> Resource {
        let mut resource = Resource::with_properties(
            &stored.resource_type,
            &stored.id,
            stored.visible_properties(),
        );

        attach_standard_actions(&mut resource);
        self.attach_state(&mut resource, stored);
        attach_links(&mut resource, stored);
        self.attach_presentation(&mut resource, stored);
        self.attach_prompts(&mut resource, stored);

        resource
    }

    fn attach_state(&self, resource: &mut Resource, stored: &StoredResource) {
        let Some(machine) = self.machines.get(&stored.resource_type) else {
            return;
        };
        let Some(status) = stored.status() else {
            return;
        };
        let href = resource.href();

        let transitions = machine.transitions_from(status);
        for transition in &transitions {
            let title = transition
                .description
                .clone()
                .unwrap_or_else(|| transition.action.clone());
            let mut action = ActionDef::new(title, ActionMethod::Post).with_href(&href);
            action.description = Some(format!("Move to '{}'", transition.target));
            resource.add_action(&transition.action, action);
        }
        for (name, def) in machine.allowed_actions(status) {
            let mut action = def.clone();
            if action.title.is_empty() {
                action.title.clone_from(name);
            }
            if action.href.is_none() {
                action.href = Some(href.clone());
            }
            resource.add_action(name, action);
        }

        let description = machine
            .state_definition(status)
            .map(|s| s.description.clone())
            .filter(|d| !d.is_empty());

        resource.set_state(ResourceState {
            current: status.to_string(),
            description,
            allowed_transitions: transitions,
            history: stored.history(),
        });
    }

    fn attach_presentation(&self, resource: &mut Resource, stored: &StoredResource) {
        let Some(rule) = self.presentation.get(&stored.resource_type) else {
            return;
        };
        resource.merge_presentation(&rule.hints);
        if let Some(hints) = stored.status().and_then(|s| rule.states.get(s)) {
            resource.merge_presentation(hints);
        }
    }

    fn attach_prompts(&self, resource: &mut Resource, stored: &StoredResource) {
        let status = stored.status();
        let configured = self
            .prompts
            .get(&stored.resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for rule in configured {
            if rule.status.as_deref().is_some_and(|s| Some(s) != status) {
                continue;
            }
            match &rule.action {
                Some(action) if resource.has_action(action) => {
                    resource.add_prompt(Prompt::for_action(&rule.text, action));
                }
                Some(_) => {}
                None => resource.add_prompt(Prompt::new(&rule.text)),
            }
        }

        let transitions = resource
            .state()
            .map(|s| s.allowed_transitions.clone())
            .unwrap_or_default();
        for transition in transitions {
            let covered = resource
                .prompts()
                .iter()
                .any(|p| p.action.as_deref() == Some(transition.action.as_str()));
            if covered {
                continue;
            }
            let text = format!(
                "Would you like to {} this {}?",
                transition.action, stored.resource_type
            );
            resource.add_prompt(Prompt::for_action(text, transition.action));
        }
    }
}

fn attach_standard_actions(resource: &mut Resource) {
    let href = resource.href();
    resource.add_action(
        ACTION_GET,
        ActionDef::new("Get", ActionMethod::Get).with_href(&href),
    );
    resource.add_action(
        ACTION_UPDATE,
        ActionDef::new("Update", ActionMethod::Put).with_href(&href),
    );
    resource.add_action(
        ACTION_DELETE,
        ActionDef::new("Delete", ActionMethod::Delete).with_href(&href),
    );
}

/// Whether `value` can stand alone as one segment of a resource href.
fn is_path_segment(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || FORBIDDEN_SEGMENT_CHARS.contains(&c))
}

fn attach_links(resource: &mut Resource, stored: &StoredResource) {
    let derived: Vec<(String, String)> = resource
        .properties()
        .iter()
        .filter_map(|(key, value)| {
            let related = related_type(key).filter(|t| is_path_segment(t))?;
            let target = value.as_str().filter(|v| is_path_segment(v))?;
            Some((related.to_string(), target.to_string()))
        })
        .collect();

    for (related, target) in derived {
        resource.add_link(Link::to_resource(&related, &related, &target));
        resource.add_relationship(
            related.clone(),
            Relationship {
                resource_type: related,
                id: target,
            },
        );
    }

    for link in stored.stored_links() {
        resource.add_link(link);
    }
}

// =============================================================================
// TESTS
// =============================================================================
