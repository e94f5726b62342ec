//! # Property-Based Tests
//!
//! Invariants that must hold for any input: pagination arithmetic,
//! enhancement determinism, and graph expansion over arbitrary link graphs.

use affordance_core::{
    CollectionQuery, MemoryStorage, Navigator, Pagination, Properties, Store,
};
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn node_id(i: usize) -> String {
    format!("n{}", i)
}

/// Store with `size` nodes and the given directed links between them.
fn linked_store(size: usize, links: &[(usize, usize, u8)]) -> Store<MemoryStorage> {
    let mut store = Store::new(MemoryStorage::new());
    for i in 0..size {
        let mut data = Properties::new();
        data.insert("id".into(), json!(node_id(i)));
        store.create("node", data).expect("create");
    }

    let mut nav = Navigator::new(&mut store);
    for &(from, to, rel) in links {
        let (from, to) = (from % size, to % size);
        nav.link(
            "node",
            &node_id(from),
            "node",
            &node_id(to),
            &format!("r{}", rel % 3),
            &format!("back{}", rel % 3),
        )
        .expect("link");
    }
    store
}

// =============================================================================
// PAGINATION
// =============================================================================

proptest! {
    /// `total_pages` is the integer ceiling of `total_items / page_size`.
    #[test]
    fn total_pages_is_ceiling(total in 0usize..100_000, size in 1usize..1000, page in 1usize..50) {
        let p = Pagination::new(page, size, total);
        prop_assert!(p.total_pages * size >= total);
        prop_assert!(p.total_pages == 0 || (p.total_pages - 1) * size < total);
    }

    /// Every page holds at most `page_size` items, and all pages together hold every item.
    #[test]
    fn pages_partition_the_collection(count in 0usize..40, size in 1usize..12) {
        let mut store = Store::new(MemoryStorage::new());
        for _ in 0..count {
            store.create("item", Properties::new()).expect("create");
        }

        let first = store
            .get_collection("item", &CollectionQuery::page(1, size))
            .expect("collection");
        let pages = first.pagination().total_pages;
        prop_assert_eq!(pages, count.div_ceil(size));

        let mut seen = BTreeSet::new();
        for page in 1..=pages.max(1) {
            let collection = store
                .get_collection("item", &CollectionQuery::page(page, size))
                .expect("collection");
            prop_assert!(collection.len() <= size);
            for item in collection.items() {
                prop_assert!(seen.insert(item.id().to_string()));
            }
        }
        prop_assert_eq!(seen.len(), count);
    }
}

// =============================================================================
// GRAPHS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No node is recorded twice and no edge is duplicated, whatever the cycles.
    #[test]
    fn graph_has_unique_nodes_and_edges(
        size in 1usize..8,
        links in vec((0usize..8, 0usize..8, any::<u8>()), 0..20),
        depth in 0usize..6,
    ) {
        let mut store = linked_store(size, &links);
        let nav = Navigator::new(&mut store);
        let graph = nav.create_graph("node", "n0", depth, None).expect("graph");

        let nodes: BTreeSet<_> = graph.nodes.iter().map(|n| n.href()).collect();
        prop_assert_eq!(nodes.len(), graph.nodes.len());
        prop_assert!(graph.nodes.len() <= size);

        let edges: BTreeSet<_> = graph.edges.iter().cloned().collect();
        prop_assert_eq!(edges.len(), graph.edges.len());
        for edge in &graph.edges {
            prop_assert!(nodes.contains(&edge.source));
            prop_assert!(nodes.contains(&edge.target));
        }
    }

    /// Building the same graph twice gives the same result.
    #[test]
    fn graph_is_deterministic(
        size in 1usize..6,
        links in vec((0usize..6, 0usize..6, any::<u8>()), 0..12),
    ) {
        let mut store = linked_store(size, &links);
        let nav = Navigator::new(&mut store);
        let first = nav.create_graph("node", "n0", 4, None).expect("graph");
        let second = nav.create_graph("node", "n0", 4, None).expect("graph");
        prop_assert_eq!(first, second);
    }
}

// =============================================================================
// ENHANCEMENT
// =============================================================================

proptest! {
    /// Reloading a resource never changes its computed view.
    #[test]
    fn reload_is_stable(keys in vec("[a-z]{1,8}(Id)?", 0..6)) {
        let mut store = Store::new(MemoryStorage::new());
        let mut data = Properties::new();
        for key in &keys {
            data.insert(key.clone(), json!("target"));
        }
        let created = store.create("thing", data).expect("create");
        let first = store.get("thing", created.id()).expect("get").expect("present");
        let second = store.get("thing", created.id()).expect("get").expect("present");
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, created);
    }
}
