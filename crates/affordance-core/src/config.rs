//! # Engine Configuration
//!
//! Deployment-time configuration of the engine, loaded from TOML.
//!
//! Every section is optional:
//!
//! ```toml
//! [collection]
//! default_page_size = 20
//! max_page_size = 200
//!
//! [graph]
//! max_depth = 5
//! summary_properties = ["name", "status"]
//!
//! [machines.task]
//! initial_state = "pending"
//! states.pending.transitions.start = { target = "inProgress" }
//! states.inProgress.transitions.complete = { target = "completed" }
//! states.completed = {}
//!
//! [presentation.task]
//! hints = { icon = "check-square" }
//! states.completed = { color = "green" }
//!
//! [[prompts.task]]
//! text = "Shall I start this task?"
//! status = "pending"
//! action = "start"
//! ```

use crate::primitives::{
    DEFAULT_GRAPH_DEPTH, DEFAULT_PAGE_SIZE, DEFAULT_SUMMARY_PROPERTIES, MAX_GRAPH_DEPTH,
    MAX_PAGE_SIZE,
};
use crate::state_machine::{MachineRegistry, StateMachineDefinition};
use crate::types::{AffordanceError, Properties};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// SECTIONS
// =============================================================================

/// Collection paging defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Graph building limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Depth cap applied to every `create_graph` call.
    pub max_depth: usize,
    /// Properties copied onto graph nodes.
    pub summary_properties: Vec<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_GRAPH_DEPTH,
            summary_properties: DEFAULT_SUMMARY_PROPERTIES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Presentation hints for one resource type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationRule {
    /// Hints applied to every resource of the type.
    pub hints: Properties,
    /// Status -> hints merged over the type hints.
    pub states: BTreeMap<String, Properties>,
}

/// A configured conversation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRule {
    pub text: String,
    /// Only offered when the resource is in this status.
    #[serde(default)]
    pub status: Option<String>,
    /// Action the prompt leads to.
    #[serde(default)]
    pub action: Option<String>,
}

// =============================================================================
// ENGINE CONFIG
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub collection: CollectionSettings,
    pub graph: GraphSettings,
    /// Resource type -> state machine definition.
    pub machines: BTreeMap<String, StateMachineDefinition>,
    /// Resource type -> presentation hints.
    pub presentation: BTreeMap<String, PresentationRule>,
    /// Resource type -> prompts.
    pub prompts: BTreeMap<String, Vec<PromptRule>>,
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, AffordanceError> {
        let config: Self =
            toml::from_str(source).map_err(|e| AffordanceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AffordanceError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            AffordanceError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    /// Check limits that serde cannot express.
    pub fn validate(&self) -> Result<(), AffordanceError> {
        let c = &self.collection;
        if c.default_page_size == 0 || c.max_page_size == 0 {
            return Err(AffordanceError::Config(
                "page sizes must be greater than zero".to_string(),
            ));
        }
        if c.default_page_size > c.max_page_size {
            return Err(AffordanceError::Config(format!(
                "default_page_size {} exceeds max_page_size {}",
                c.default_page_size, c.max_page_size
            )));
        }
        if self.graph.max_depth > MAX_GRAPH_DEPTH {
            return Err(AffordanceError::Config(format!(
                "graph max_depth {} exceeds the hard limit {}",
                self.graph.max_depth, MAX_GRAPH_DEPTH
            )));
        }
        Ok(())
    }

    /// Build a validated machine registry from the `[machines]` section.
    pub fn machine_registry(&self) -> Result<MachineRegistry, AffordanceError> {
        MachineRegistry::from_definitions(
            self.machines
                .iter()
                .map(|(resource_type, def)| (resource_type.clone(), def.clone())),
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [collection]
        default_page_size = 5
        max_page_size = 50

        [graph]
        max_depth = 4

        [machines.task]
        initial_state = "pending"
        states.pending.transitions.start = { target = "inProgress" }
        states.inProgress.transitions.complete = { target = "completed" }
        states.completed = {}

        [presentation.task]
        hints = { icon = "check-square" }
        states.completed = { color = "green" }

        [[prompts.task]]
        text = "Shall I start this task?"
        status = "pending"
        action = "start"
    "#;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("parse");
        assert_eq!(config.collection.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.graph.max_depth, DEFAULT_GRAPH_DEPTH);
        assert_eq!(config.graph.summary_properties.len(), 4);
        assert!(config.machines.is_empty());
    }

    #[test]
    fn full_document_parses() {
        let config = EngineConfig::from_toml_str(SAMPLE).expect("parse");
        assert_eq!(config.collection.default_page_size, 5);
        assert_eq!(config.graph.max_depth, 4);

        let registry = config.machine_registry().expect("registry");
        let machine = registry.get("task").expect("task machine");
        assert_eq!(machine.target_state("pending", "start"), Some("inProgress"));

        let rule = &config.presentation["task"];
        assert_eq!(rule.hints["icon"], "check-square");
        assert_eq!(rule.states["completed"]["color"], "green");

        let prompts = &config.prompts["task"];
        assert_eq!(prompts[0].status.as_deref(), Some("pending"));
    }

    #[test]
    fn rejects_inconsistent_page_sizes() {
        let err = EngineConfig::from_toml_str(
            "[collection]\ndefault_page_size = 100\nmax_page_size = 10\n",
        )
        .expect_err("default above max");
        assert!(matches!(err, AffordanceError::Config(_)));
    }

    #[test]
    fn rejects_depth_above_hard_limit() {
        let source = format!("[graph]\nmax_depth = {}\n", MAX_GRAPH_DEPTH + 1);
        assert!(EngineConfig::from_toml_str(&source).is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("[collection"),
            Err(AffordanceError::Config(_))
        ));
    }

    #[test]
    fn invalid_machine_surfaces_at_registry_build() {
        let config = EngineConfig::from_toml_str(
            "[machines.doc]\ninitial_state = \"draft\"\nstates.published = {}\n",
        )
        .expect("parse");
        assert!(matches!(
            config.machine_registry(),
            Err(AffordanceError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, SAMPLE).expect("write");
        let config = EngineConfig::load(&path).expect("load");
        assert!(config.machines.contains_key("task"));

        assert!(EngineConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
