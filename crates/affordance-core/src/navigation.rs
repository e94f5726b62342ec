//! # Navigation
//!
//! Traversal and mutation of the link graph formed by resources.
//!
//! The navigator only talks to the `Store`. It never reaches storage directly,
//! so every resource it returns has been through the enhancement pipeline.
//!
//! ## Limits
//!
//! - `create_graph` is breadth-first with a visited set, so cycles terminate
//!   and each `(type, id)` is expanded at most once
//! - Depth is clamped to the configured maximum
//! - `find_referencing` scans every stored resource; there is no reverse index
//! - `link` writes both endpoints one after the other with no transaction.
//!   Both `link` and `unlink` are idempotent, so a half-applied call is
//!   repaired by running it again

use crate::primitives::{LABEL_PROPERTIES, SELF_REL};
use crate::resource::Resource;
use crate::storage::Storage;
use crate::store::{CollectionQuery, Store};
use crate::types::{AffordanceError, Link, Properties, resource_href};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Outcome of following one relation from a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Traversal {
    /// No link of the relation resolved.
    None,
    /// Exactly one resolved.
    One(Resource),
    /// Several resolved, in link order.
    Many(Vec<Resource>),
}

impl Traversal {
    /// All resolved resources, in link order.
    #[must_use]
    pub fn into_vec(self) -> Vec<Resource> {
        match self {
            Self::None => Vec::new(),
            Self::One(resource) => vec![resource],
            Self::Many(resources) => resources,
        }
    }
}

/// A node of a resource graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub label: String,
    /// Summary subset of the resource's properties.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: Properties,
}

impl GraphNode {
    /// Canonical href of the node's resource.
    #[must_use]
    pub fn href(&self) -> String {
        resource_href(&self.resource_type, &self.id)
    }
}

/// A directed edge between two graph nodes, identified by href.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

/// Nodes and edges reachable from a seed resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    /// Discovery order, seed first.
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ResourceGraph {
    #[must_use]
    pub fn node(&self, resource_type: &str, id: &str) -> Option<&GraphNode> {
        self.nodes
            .iter()
            .find(|n| n.resource_type == resource_type && n.id == id)
    }
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Link-graph operations over a store.
#[derive(Debug)]
pub struct Navigator<'a, S: Storage> {
    store: &'a mut Store<S>,
}

impl<'a, S: Storage> Navigator<'a, S> {
    pub fn new(store: &'a mut Store<S>) -> Self {
        Self { store }
    }

    fn require(&self, resource_type: &str, id: &str) -> Result<Resource, AffordanceError> {
        self.store
            .get(resource_type, id)?
            .ok_or_else(|| AffordanceError::not_found(resource_type, id))
    }

    /// Follow every link of `relation` from a resource.
    ///
    /// Links whose target does not resolve are skipped.
    pub fn traverse(
        &self,
        resource_type: &str,
        id: &str,
        relation: &str,
    ) -> Result<Traversal, AffordanceError> {
        let source = self.require(resource_type, id)?;

        let mut resolved = Vec::new();
        for link in source.links_by_rel(relation) {
            if let Some(target) = self.resolve(link)? {
                resolved.push(target);
            }
        }

        Ok(match resolved.len() {
            0 => Traversal::None,
            1 => resolved
                .pop()
                .map(Traversal::One)
                .unwrap_or(Traversal::None),
            _ => Traversal::Many(resolved),
        })
    }

    fn resolve(&self, link: &Link) -> Result<Option<Resource>, AffordanceError> {
        let Some((resource_type, id)) = link.target() else {
            return Ok(None);
        };
        let resolved = self.store.get(resource_type, id)?;
        if resolved.is_none() {
            tracing::warn!(rel = %link.rel, href = %link.href, "skipping unresolvable link");
        }
        Ok(resolved)
    }

    /// Link two resources in both directions.
    ///
    /// The source gains `src_rel -> destination` and the destination gains
    /// `dst_rel -> source`. Existing identical links are left alone.
    /// Returns the updated source.
    pub fn link(
        &mut self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
        src_rel: &str,
        dst_rel: &str,
    ) -> Result<Resource, AffordanceError> {
        let mut forward = self.store.stored_links(src_type, src_id)?;
        let mut backward = self.store.stored_links(dst_type, dst_id)?;

        if (src_type, src_id) == (dst_type, dst_id) {
            let added = push_unique(&mut forward, Link::to_resource(src_rel, dst_type, dst_id))
                | push_unique(&mut forward, Link::to_resource(dst_rel, src_type, src_id));
            if added {
                self.store
                    .replace_stored_links(src_type, src_id, &forward)?;
            }
            return self.require(src_type, src_id);
        }

        if push_unique(&mut forward, Link::to_resource(src_rel, dst_type, dst_id)) {
            self.store
                .replace_stored_links(src_type, src_id, &forward)?;
        }
        if push_unique(&mut backward, Link::to_resource(dst_rel, src_type, src_id)) {
            self.store
                .replace_stored_links(dst_type, dst_id, &backward)?;
        }

        tracing::debug!(
            source = %resource_href(src_type, src_id),
            target = %resource_href(dst_type, dst_id),
            src_rel,
            dst_rel,
            "linked resources"
        );
        self.require(src_type, src_id)
    }

    /// Remove the links `link` would have created. Returns the updated source.
    pub fn unlink(
        &mut self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
        src_rel: &str,
        dst_rel: &str,
    ) -> Result<Resource, AffordanceError> {
        let mut forward = self.store.stored_links(src_type, src_id)?;
        let mut backward = self.store.stored_links(dst_type, dst_id)?;

        if (src_type, src_id) == (dst_type, dst_id) {
            let href = resource_href(src_type, src_id);
            let removed = remove_matching(&mut forward, src_rel, &href)
                | remove_matching(&mut forward, dst_rel, &href);
            if removed {
                self.store
                    .replace_stored_links(src_type, src_id, &forward)?;
            }
            return self.require(src_type, src_id);
        }

        if remove_matching(&mut forward, src_rel, &resource_href(dst_type, dst_id)) {
            self.store
                .replace_stored_links(src_type, src_id, &forward)?;
        }
        if remove_matching(&mut backward, dst_rel, &resource_href(src_type, src_id)) {
            self.store
                .replace_stored_links(dst_type, dst_id, &backward)?;
        }

        tracing::debug!(
            source = %resource_href(src_type, src_id),
            target = %resource_href(dst_type, dst_id),
            "unlinked resources"
        );
        self.require(src_type, src_id)
    }

    /// Every resource holding a link to `(type, id)`, optionally of one relation.
    ///
    /// Walks every page of every stored type. `self` links never count.
    pub fn find_referencing(
        &self,
        resource_type: &str,
        id: &str,
        relation: Option<&str>,
    ) -> Result<Vec<Resource>, AffordanceError> {
        let target = resource_href(resource_type, id);
        let page_size = self.store.collection_settings().max_page_size;
        let mut found = Vec::new();

        for scanned_type in self.store.list_types()? {
            let mut page = 1;
            loop {
                let collection = self
                    .store
                    .get_collection(&scanned_type, &CollectionQuery::page(page, page_size))?;
                let last_page = !collection.pagination().has_next();

                for item in collection.into_items() {
                    let refers = item.links().iter().any(|l| {
                        l.rel != SELF_REL
                            && l.href == target
                            && relation.is_none_or(|rel| l.rel == rel)
                    });
                    if refers {
                        found.push(item);
                    }
                }

                if last_page {
                    break;
                }
                page = page.saturating_add(1);
            }
        }

        Ok(found)
    }

    /// Build the graph reachable from a seed within `depth` hops.
    ///
    /// - `relations` restricts which link relations are followed
    /// - Nodes at the depth boundary are recorded but not expanded
    /// - A link back along an already recorded edge adds no edge
    pub fn create_graph(
        &self,
        seed_type: &str,
        seed_id: &str,
        depth: usize,
        relations: Option<&[&str]>,
    ) -> Result<ResourceGraph, AffordanceError> {
        let depth = depth.min(self.store.graph_settings().max_depth);
        let seed = self.require(seed_type, seed_id)?;

        let mut graph = ResourceGraph::default();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut recorded: BTreeSet<GraphEdge> = BTreeSet::new();
        let mut connected: BTreeSet<(String, String)> = BTreeSet::new();
        let mut queue: VecDeque<(Resource, usize)> = VecDeque::new();

        visited.insert(seed.href());
        graph.nodes.push(self.graph_node(&seed));
        queue.push_back((seed, 0));

        while let Some((resource, level)) = queue.pop_front() {
            if level >= depth {
                continue;
            }
            let source = resource.href();

            for link in resource.links() {
                if link.rel == SELF_REL {
                    continue;
                }
                if relations.is_some_and(|allowed| !allowed.contains(&link.rel.as_str())) {
                    continue;
                }
                let Some((target_type, target_id)) = link.target() else {
                    continue;
                };
                let target = resource_href(target_type, target_id);

                if !visited.contains(&target) {
                    let Some(next) = self.resolve(link)? else {
                        continue;
                    };
                    visited.insert(target.clone());
                    graph.nodes.push(self.graph_node(&next));
                    queue.push_back((next, level.saturating_add(1)));
                }

                if connected.contains(&(target.clone(), source.clone())) {
                    continue;
                }
                let edge = GraphEdge {
                    source: source.clone(),
                    target: target.clone(),
                    relation: link.rel.clone(),
                };
                if recorded.insert(edge.clone()) {
                    connected.insert((source.clone(), target));
                    graph.edges.push(edge);
                }
            }
        }

        tracing::debug!(
            seed = %resource_href(seed_type, seed_id),
            depth,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "built resource graph"
        );
        Ok(graph)
    }

    fn graph_node(&self, resource: &Resource) -> GraphNode {
        let label = LABEL_PROPERTIES
            .iter()
            .find_map(|key| resource.property_str(key).filter(|s| !s.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} {}", resource.resource_type(), resource.id()));

        let properties = self
            .store
            .graph_settings()
            .summary_properties
            .iter()
            .filter_map(|key| {
                resource
                    .property(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect();

        GraphNode {
            id: resource.id().to_string(),
            resource_type: resource.resource_type().to_string(),
            label,
            properties,
        }
    }
}

fn push_unique(links: &mut Vec<Link>, link: Link) -> bool {
    if links.iter().any(|l| l.rel == link.rel && l.href == link.href) {
        return false;
    }
    links.push(link);
    true
}

fn remove_matching(links: &mut Vec<Link>, rel: &str, href: &str) -> bool {
    let before = links.len();
    links.retain(|l| !(l.rel == rel && l.href == href));
    links.len() != before
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::{Value, json};

    fn bag(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => Properties::new(),
        }
    }

    fn store_with(items: &[(&str, Value)]) -> Store<MemoryStorage> {
        let mut store = Store::new(MemoryStorage::new());
        for (resource_type, data) in items {
            store
                .create(resource_type, bag(data.clone()))
                .expect("create");
        }
        store
    }

    #[test]
    fn traverse_counts_resolved_targets() {
        let mut store = store_with(&[
            ("customer", json!({"id": "c1", "name": "Ada"})),
            ("order", json!({"id": "o1", "customerId": "c1", "couponId": "gone"})),
        ]);
        let nav = Navigator::new(&mut store);

        assert!(matches!(
            nav.traverse("order", "o1", "customer").expect("traverse"),
            Traversal::One(ref customer) if customer.id() == "c1"
        ));
        assert_eq!(
            nav.traverse("order", "o1", "coupon").expect("traverse"),
            Traversal::None
        );
        assert!(matches!(
            nav.traverse("order", "missing", "customer"),
            Err(AffordanceError::NotFound { .. })
        ));
    }

    #[test]
    fn link_is_symmetric_and_idempotent() {
        let mut store = store_with(&[
            ("project", json!({"id": "p1"})),
            ("task", json!({"id": "t1"})),
            ("task", json!({"id": "t2"})),
        ]);
        let mut nav = Navigator::new(&mut store);

        nav.link("project", "p1", "task", "t1", "tasks", "project")
            .expect("link");
        nav.link("project", "p1", "task", "t2", "tasks", "project")
            .expect("link");
        let project = nav
            .link("project", "p1", "task", "t1", "tasks", "project")
            .expect("relink");
        assert_eq!(project.links_by_rel("tasks").count(), 2);

        let tasks = nav.traverse("project", "p1", "tasks").expect("traverse");
        assert_eq!(tasks.into_vec().len(), 2);
        assert!(matches!(
            nav.traverse("task", "t1", "project").expect("traverse"),
            Traversal::One(_)
        ));

        let project = nav
            .unlink("project", "p1", "task", "t1", "tasks", "project")
            .expect("unlink");
        assert_eq!(project.links_by_rel("tasks").count(), 1);
        nav.unlink("project", "p1", "task", "t1", "tasks", "project")
            .expect("unlink again");
        assert_eq!(
            nav.traverse("task", "t1", "project").expect("traverse"),
            Traversal::None
        );
    }

    #[test]
    fn link_requires_both_endpoints() {
        let mut store = store_with(&[("project", json!({"id": "p1"}))]);
        let mut nav = Navigator::new(&mut store);
        let err = nav
            .link("project", "p1", "task", "nope", "tasks", "project")
            .expect_err("missing target");
        assert!(matches!(err, AffordanceError::NotFound { .. }));

        let project = nav.traverse("project", "p1", "tasks").expect("traverse");
        assert_eq!(project, Traversal::None);
    }

    #[test]
    fn find_referencing_scans_all_types() {
        let mut store = store_with(&[
            ("customer", json!({"id": "c1"})),
            ("order", json!({"id": "o1", "customerId": "c1"})),
            ("order", json!({"id": "o2", "customerId": "c2"})),
            ("invoice", json!({"id": "i1", "customer_id": "c1"})),
        ]);
        let nav = Navigator::new(&mut store);

        let refs = nav.find_referencing("customer", "c1", None).expect("scan");
        let ids: Vec<_> = refs.iter().map(Resource::href).collect();
        assert_eq!(ids, vec!["/invoice/i1", "/order/o1"]);

        let refs = nav
            .find_referencing("customer", "c1", Some("payer"))
            .expect("scan");
        assert!(refs.is_empty());
    }

    #[test]
    fn graph_labels_and_summaries() {
        let mut store = store_with(&[
            ("customer", json!({"id": "c1", "name": "Ada", "secret": "x"})),
            ("order", json!({"id": "o1", "customerId": "c1"})),
        ]);
        let nav = Navigator::new(&mut store);

        let graph = nav.create_graph("order", "o1", 2, None).expect("graph");
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].label, "order o1");
        let customer = graph.node("customer", "c1").expect("customer node");
        assert_eq!(customer.label, "Ada");
        assert!(customer.properties.contains_key("name"));
        assert!(!customer.properties.contains_key("secret"));
        assert_eq!(
            graph.edges,
            vec![GraphEdge {
                source: "/order/o1".into(),
                target: "/customer/c1".into(),
                relation: "customer".into(),
            }]
        );
    }

    #[test]
    fn graph_depth_zero_is_seed_only() {
        let mut store = store_with(&[
            ("customer", json!({"id": "c1"})),
            ("order", json!({"id": "o1", "customerId": "c1"})),
        ]);
        let nav = Navigator::new(&mut store);
        let graph = nav.create_graph("order", "o1", 0, None).expect("graph");
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn graph_respects_relation_filter() {
        let mut store = store_with(&[
            ("customer", json!({"id": "c1"})),
            ("warehouse", json!({"id": "w1"})),
            ("order", json!({"id": "o1", "customerId": "c1", "warehouseId": "w1"})),
        ]);
        let nav = Navigator::new(&mut store);
        let graph = nav
            .create_graph("order", "o1", 3, Some(&["warehouse"]))
            .expect("graph");
        assert!(graph.node("warehouse", "w1").is_some());
        assert!(graph.node("customer", "c1").is_none());
    }
}
