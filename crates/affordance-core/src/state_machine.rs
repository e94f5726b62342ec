//! # State Machines
//!
//! Per-type definitions of states, their allowed actions and action-triggered
//! transitions, plus the stateless evaluator over one definition.
//!
//! - Definitions are validated eagerly: a `StateMachine` can only be built
//!   from a consistent definition.
//! - Every lookup is a `BTreeMap` access; unknown states and actions yield
//!   `None` or empty results, never a panic.
//! - The `MachineRegistry` is passed to the store explicitly. There is no
//!   global registry.

use crate::primitives::RESERVED_ACTIONS;
use crate::types::{ActionDef, AffordanceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static NO_ACTIONS: BTreeMap<String, ActionDef> = BTreeMap::new();

// =============================================================================
// DEFINITION
// =============================================================================

/// Target of an action-triggered transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDef {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One state of a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateDefinition {
    #[serde(default)]
    pub description: String,
    /// Actions available in this state that do not change status.
    #[serde(default)]
    pub allowed_actions: BTreeMap<String, ActionDef>,
    /// Action name -> transition.
    #[serde(default)]
    pub transitions: BTreeMap<String, TransitionDef>,
}

/// Definition of a per-type state machine.
///
/// Deserializes from TOML or JSON:
///
/// ```toml
/// initial_state = "pending"
///
/// [states.pending]
/// description = "Waiting to be picked up"
/// transitions.start = { target = "inProgress" }
///
/// [states.inProgress]
/// transitions.complete = { target = "completed" }
///
/// [states.completed]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    pub initial_state: String,
    #[serde(default)]
    pub states: BTreeMap<String, StateDefinition>,
}

impl StateMachineDefinition {
    /// Create a definition whose initial state exists with no description.
    #[must_use]
    pub fn new(initial_state: impl Into<String>) -> Self {
        let initial_state = initial_state.into();
        let mut states = BTreeMap::new();
        states.insert(initial_state.clone(), StateDefinition::default());
        Self {
            initial_state,
            states,
        }
    }

    /// Add (or describe) a state.
    #[must_use]
    pub fn with_state(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.states.entry(name.into()).or_default().description = description.into();
        self
    }

    /// Add a transition. Both endpoints are created if missing.
    #[must_use]
    pub fn with_transition(
        mut self,
        from: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let target = target.into();
        self.states.entry(target.clone()).or_default();
        self.states.entry(from.into()).or_default().transitions.insert(
            action.into(),
            TransitionDef {
                target,
                description: None,
            },
        );
        self
    }

    /// Add a non-transitioning action to a state.
    #[must_use]
    pub fn with_allowed_action(
        mut self,
        state: impl Into<String>,
        name: impl Into<String>,
        action: ActionDef,
    ) -> Self {
        self.states
            .entry(state.into())
            .or_default()
            .allowed_actions
            .insert(name.into(), action);
        self
    }
}

/// A transition available from some state, as exposed on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub action: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// EVALUATOR
// =============================================================================

/// Stateless evaluator over one validated definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    definition: StateMachineDefinition,
}

impl StateMachine {
    /// Build an evaluator, validating the definition first.
    pub fn new(definition: StateMachineDefinition) -> Result<Self, AffordanceError> {
        Self::validate(&definition)?;
        Ok(Self { definition })
    }

    /// Check a definition for consistency.
    ///
    /// - The initial state names an existing state
    /// - Every transition target names an existing state
    /// - No state or action name is empty
    /// - No transition or allowed action shadows `get`, `update` or `delete`
    pub fn validate(definition: &StateMachineDefinition) -> Result<(), AffordanceError> {
        let invalid = |msg: String| Err(AffordanceError::InvalidDefinition(msg));

        if definition.states.is_empty() {
            return invalid("definition has no states".to_string());
        }
        if !definition.states.contains_key(&definition.initial_state) {
            return invalid(format!(
                "initial state '{}' is not a defined state",
                definition.initial_state
            ));
        }

        for (name, state) in &definition.states {
            if name.is_empty() {
                return invalid("state names must be non-empty".to_string());
            }

            let action_names = state.transitions.keys().chain(state.allowed_actions.keys());
            for action in action_names {
                if action.is_empty() {
                    return invalid(format!("state '{}' has an unnamed action", name));
                }
                if RESERVED_ACTIONS.contains(&action.as_str()) {
                    return invalid(format!(
                        "state '{}' redefines reserved action '{}'",
                        name, action
                    ));
                }
            }

            for (action, transition) in &state.transitions {
                if !definition.states.contains_key(&transition.target) {
                    return invalid(format!(
                        "transition '{}' from '{}' targets unknown state '{}'",
                        action, name, transition.target
                    ));
                }
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn definition(&self) -> &StateMachineDefinition {
        &self.definition
    }

    #[must_use]
    pub fn initial_state(&self) -> &str {
        &self.definition.initial_state
    }

    #[must_use]
    pub fn state_definition(&self, name: &str) -> Option<&StateDefinition> {
        self.definition.states.get(name)
    }

    /// Whether `action` is exposed in `state`, either as a transition or an allowed action.
    #[must_use]
    pub fn is_action_allowed(&self, state: &str, action: &str) -> bool {
        self.state_definition(state).is_some_and(|s| {
            s.transitions.contains_key(action) || s.allowed_actions.contains_key(action)
        })
    }

    /// Target state of `action` from `state`, if that transition exists.
    #[must_use]
    pub fn target_state(&self, state: &str, action: &str) -> Option<&str> {
        self.state_definition(state)?
            .transitions
            .get(action)
            .map(|t| t.target.as_str())
    }

    /// Non-transitioning actions of `state`. Empty for unknown states.
    #[must_use]
    pub fn allowed_actions(&self, state: &str) -> &BTreeMap<String, ActionDef> {
        self.state_definition(state)
            .map(|s| &s.allowed_actions)
            .unwrap_or(&NO_ACTIONS)
    }

    /// Transitions leaving `state`, ordered by action name.
    #[must_use]
    pub fn transitions_from(&self, state: &str) -> Vec<Transition> {
        self.state_definition(state)
            .map(|s| {
                s.transitions
                    .iter()
                    .map(|(action, t)| Transition {
                        action: action.clone(),
                        target: t.target.clone(),
                        description: t.description.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolve a transition or fail with `InvalidTransition`.
    pub fn transition(&self, state: &str, action: &str) -> Result<&str, AffordanceError> {
        self.target_state(state, action)
            .ok_or_else(|| AffordanceError::InvalidTransition {
                from: state.to_string(),
                action: action.to_string(),
            })
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Explicit mapping from resource type to its governing machine.
#[derive(Debug, Clone, Default)]
pub struct MachineRegistry {
    machines: BTreeMap<String, StateMachine>,
}

impl MachineRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(type, definition)` pairs, failing on the first invalid one.
    pub fn from_definitions<I>(definitions: I) -> Result<Self, AffordanceError>
    where
        I: IntoIterator<Item = (String, StateMachineDefinition)>,
    {
        let mut registry = Self::new();
        for (resource_type, definition) in definitions {
            registry.register(resource_type, definition)?;
        }
        Ok(registry)
    }

    /// Validate and register a machine, replacing any existing one for the type.
    ///
    /// Returns the replaced machine, if there was one.
    pub fn register(
        &mut self,
        resource_type: impl Into<String>,
        definition: StateMachineDefinition,
    ) -> Result<Option<StateMachine>, AffordanceError> {
        let resource_type = resource_type.into();
        let machine = StateMachine::new(definition)?;
        let replaced = self.machines.insert(resource_type.clone(), machine);
        if replaced.is_some() {
            tracing::warn!(
                resource_type = %resource_type,
                "replacing previously registered state machine"
            );
        }
        Ok(replaced)
    }

    #[must_use]
    pub fn get(&self, resource_type: &str) -> Option<&StateMachine> {
        self.machines.get(resource_type)
    }

    #[must_use]
    pub fn is_governed(&self, resource_type: &str) -> bool {
        self.machines.contains_key(resource_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.machines.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
