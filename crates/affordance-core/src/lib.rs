//! # affordance-core
//!
//! The hypermedia resource engine for Affordance.
//!
//! Resources are typed property bags that the engine turns into a uniform
//! hypermedia surface: computed actions, a state-machine governed status,
//! links to related resources, presentation hints and follow-up prompts.
//!
//! ## Layers
//!
//! - `types`, `primitives`: shared vocabulary and compiled-in limits
//! - `resource`, `collection`: the value objects clients see
//! - `state_machine`: per-type definitions and their evaluator
//! - `enhance`: the pipeline deriving a `Resource` from a stored bag
//! - `store`: persistence, actions and transitions
//! - `navigation`: link traversal, linking and graph building
//! - `protocol`: `explore` / `act` / `create` over resource URIs
//! - `storage`: the persistence collaborator (in-memory or redb)
//! - `config`: TOML engine configuration
//!
//! ## Architectural Constraints
//!
//! - Synchronous and single-threaded per `Store`
//! - No global state: machines are registered on the store that uses them
//! - Deterministic output: every computed map is a `BTreeMap`

// =============================================================================
// MODULES
// =============================================================================

pub mod collection;
pub mod config;
pub mod enhance;
pub mod navigation;
pub mod primitives;
pub mod protocol;
pub mod resource;
pub mod state_machine;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    ActionDef, ActionMethod, AffordanceError, ErrorKind, Link, Prompt, Properties, Relationship,
    resource_href,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use collection::{Collection, Pagination};
pub use config::{CollectionSettings, EngineConfig, GraphSettings, PresentationRule, PromptRule};
pub use enhance::{Enhancer, StoredResource};
pub use navigation::{GraphEdge, GraphNode, Navigator, ResourceGraph, Traversal};
pub use protocol::{Explored, ResourceUri};
pub use resource::{Resource, ResourceState, StatusChange};
pub use state_machine::{
    MachineRegistry, StateDefinition, StateMachine, StateMachineDefinition, Transition,
    TransitionDef,
};
pub use store::{CollectionQuery, Store};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use storage::{
    ListPage, ListQuery, MemoryStorage, RedbStorage, Storage, StorageBackend, matches_filter,
};
