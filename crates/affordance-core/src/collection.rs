//! # Collection
//!
//! Ordered, paginated, filtered list of resources of a single type.
//!
//! Pagination uses integer arithmetic only:
//! `total_pages == ceil(total_items / page_size)`.

use crate::resource::Resource;
use crate::types::{ActionDef, AffordanceError, Link, Properties};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use url::form_urlencoded;

// =============================================================================
// PAGINATION
// =============================================================================

/// Page metadata of a collection. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl Pagination {
    /// Compute pagination for a page. A zero page size yields zero pages.
    #[must_use]
    pub fn new(page: usize, page_size: usize, total_items: usize) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_items.div_ceil(page_size)
        };
        Self {
            page,
            page_size,
            total_items,
            total_pages,
        }
    }

    /// Zero-based offset of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Page a `prev` link points at. Past the end this is the last page.
    #[must_use]
    pub fn prev_page(&self) -> Option<usize> {
        self.has_prev()
            .then(|| self.page.saturating_sub(1).min(self.total_pages.max(1)))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, crate::primitives::DEFAULT_PAGE_SIZE, 0)
    }
}

// =============================================================================
// COLLECTION
// =============================================================================

/// A page of homogeneous resources plus collection-level affordances.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    item_type: String,
    items: Vec<Resource>,
    pagination: Pagination,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    filters: Properties,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    aggregates: Properties,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    actions: BTreeMap<String, ActionDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    links: Vec<Link>,
}

impl Collection {
    /// Create an empty collection of `item_type`.
    #[must_use]
    pub fn new(item_type: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            items: Vec::new(),
            pagination: Pagination::default(),
            filters: Properties::new(),
            aggregates: Properties::new(),
            actions: BTreeMap::new(),
            links: Vec::new(),
        }
    }

    #[must_use]
    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    /// Collection href: `/{type}`.
    #[must_use]
    pub fn href(&self) -> String {
        format!("/{}", self.item_type)
    }

    /// Append a resource. Rejects resources of another type.
    pub fn add_item(&mut self, resource: Resource) -> Result<(), AffordanceError> {
        if resource.resource_type() != self.item_type {
            return Err(AffordanceError::InvalidItemType {
                expected: self.item_type.clone(),
                found: resource.resource_type().to_string(),
            });
        }
        self.items.push(resource);
        Ok(())
    }

    #[must_use]
    pub fn items(&self) -> &[Resource] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<Resource> {
        self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn set_pagination(&mut self, pagination: Pagination) {
        self.pagination = pagination;
    }

    #[must_use]
    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn set_filters(&mut self, filters: Properties) {
        self.filters = filters;
    }

    /// Active equality filters, if any.
    #[must_use]
    pub fn filters(&self) -> Option<&Properties> {
        (!self.filters.is_empty()).then_some(&self.filters)
    }

    pub fn set_aggregates(&mut self, aggregates: Properties) {
        self.aggregates = aggregates;
    }

    #[must_use]
    pub fn aggregates(&self) -> Option<&Properties> {
        (!self.aggregates.is_empty()).then_some(&self.aggregates)
    }

    pub fn add_action(&mut self, name: impl Into<String>, action: ActionDef) {
        self.actions.insert(name.into(), action);
    }

    #[must_use]
    pub fn actions(&self) -> &BTreeMap<String, ActionDef> {
        &self.actions
    }

    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    #[must_use]
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// Rebuild `self`, `first`, `last`, `prev` and `next` links from the
    /// current pagination and filters.
    pub fn refresh_page_links(&mut self) {
        let p = self.pagination;
        let mut links = vec![Link::new("self", self.page_href(p.page))];
        if p.total_pages > 0 {
            links.push(Link::new("first", self.page_href(1)));
            links.push(Link::new("last", self.page_href(p.total_pages)));
        }
        if let Some(prev) = p.prev_page() {
            links.push(Link::new("prev", self.page_href(prev)));
        }
        if p.has_next() {
            links.push(Link::new("next", self.page_href(p.page.saturating_add(1))));
        }
        self.links = links;
    }

    fn page_href(&self, page: usize) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.filters {
            query.append_pair(key, &filter_text(value));
        }
        query.append_pair("page", &page.to_string());
        query.append_pair("pageSize", &self.pagination.page_size.to_string());
        format!("{}?{}", self.href(), query.finish())
    }

    /// Serialize to the transfer representation.
    pub fn to_json(&self) -> Result<Value, AffordanceError> {
        serde_json::to_value(self).map_err(|e| AffordanceError::SerializationError(e.to_string()))
    }
}

/// Text form of a filter value as it appears in a query string.
pub(crate) fn filter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pagination_rounds_up() {
        assert_eq!(Pagination::new(1, 2, 3).total_pages, 2);
        assert_eq!(Pagination::new(1, 2, 4).total_pages, 2);
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 1, 7).total_pages, 7);
        assert_eq!(Pagination::new(1, 0, 7).total_pages, 0);
    }

    #[test]
    fn pagination_navigation() {
        let p = Pagination::new(2, 10, 25);
        assert_eq!(p.offset(), 10);
        assert!(p.has_prev());
        assert!(p.has_next());

        let last = Pagination::new(3, 10, 25);
        assert!(!last.has_next());
        assert_eq!(last.prev_page(), Some(2));
        assert!(!Pagination::new(1, 10, 25).has_prev());
        assert_eq!(Pagination::new(1, 10, 25).prev_page(), None);
    }

    #[test]
    fn prev_link_past_the_end_points_at_last_page() {
        let mut collection = Collection::new("widget");
        collection.set_pagination(Pagination::new(9, 2, 5));
        collection.refresh_page_links();

        assert_eq!(
            collection.link("prev").map(|l| l.href.as_str()),
            Some("/widget?page=3&pageSize=2")
        );
        assert!(collection.link("next").is_none());

        let mut empty = Collection::new("widget");
        empty.set_pagination(Pagination::new(4, 2, 0));
        empty.refresh_page_links();
        assert_eq!(
            empty.link("prev").map(|l| l.href.as_str()),
            Some("/widget?page=1&pageSize=2")
        );
    }

    #[test]
    fn add_item_rejects_other_types() {
        let mut collection = Collection::new("widget");
        collection
            .add_item(Resource::new("widget", "w1"))
            .expect("same type");
        let err = collection
            .add_item(Resource::new("gadget", "g1"))
            .expect_err("other type");
        assert!(matches!(err, AffordanceError::InvalidItemType { .. }));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn optional_sections_omitted_when_empty() {
        let collection = Collection::new("widget");
        let json = collection.to_json().expect("serialize");
        assert_eq!(json["itemType"], "widget");
        assert_eq!(json["items"], json!([]));
        assert_eq!(json["pagination"]["pageSize"], 20);
        assert!(json.get("filters").is_none());
        assert!(json.get("aggregates").is_none());
        assert!(json.get("actions").is_none());
        assert!(collection.filters().is_none());
    }

    #[test]
    fn page_links_carry_filters() {
        let mut collection = Collection::new("widget");
        let mut filters = Properties::new();
        filters.insert("color".into(), json!("red"));
        collection.set_filters(filters);
        collection.set_pagination(Pagination::new(1, 2, 3));
        collection.refresh_page_links();

        assert_eq!(
            collection.link("self").map(|l| l.href.as_str()),
            Some("/widget?color=red&page=1&pageSize=2")
        );
        assert_eq!(
            collection.link("next").map(|l| l.href.as_str()),
            Some("/widget?color=red&page=2&pageSize=2")
        );
        assert!(collection.link("prev").is_none());
        assert_eq!(
            collection.link("last").map(|l| l.href.as_str()),
            Some("/widget?color=red&page=2&pageSize=2")
        );
    }

    #[test]
    fn items_serialize_recursively() {
        let mut collection = Collection::new("widget");
        collection
            .add_item(Resource::new("widget", "w1"))
            .expect("add");
        let json = collection.to_json().expect("serialize");
        assert_eq!(json["items"][0]["id"], "w1");
        assert_eq!(json["items"][0]["links"][0]["href"], "/widget/w1");
    }
}
