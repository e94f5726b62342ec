//! # Protocol Facade
//!
//! The three transport-neutral verbs a protocol adapter maps onto its wire
//! format: `explore`, `act` and `create`.
//!
//! Resources are addressed by URI:
//!
//! - `/{type}` names a collection
//! - `/{type}/{id}` names a resource
//! - `?key=value` pairs on a collection are equality filters, except `page`
//!   and `pageSize` which select the page
//!
//! Status codes and RPC envelopes belong to the adapter. `AffordanceError::kind`
//! gives it a stable classification to map from.

use crate::collection::{Collection, filter_text};
use crate::resource::Resource;
use crate::storage::Storage;
use crate::store::{CollectionQuery, Store};
use crate::types::{AffordanceError, Properties};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use url::form_urlencoded;

const PAGE_PARAM: &str = "page";
const PAGE_SIZE_PARAM: &str = "pageSize";

// =============================================================================
// URI
// =============================================================================

/// A parsed resource or collection address.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceUri {
    pub resource_type: String,
    pub id: Option<String>,
    /// Equality filters from the query string.
    pub filter: Properties,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl ResourceUri {
    /// Parse `/type[/id][?query]`.
    pub fn parse(raw: &str) -> Result<Self, AffordanceError> {
        let invalid = |reason: &str| AffordanceError::InvalidUri(format!("'{}': {}", raw, reason));

        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw, None),
        };
        let path = path
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;
        let path = path.strip_suffix('/').unwrap_or(path);

        let mut segments = path.split('/');
        let resource_type = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing resource type"))?
            .to_string();
        let id = match segments.next() {
            Some("") => return Err(invalid("empty id segment")),
            Some(id) => Some(id.to_string()),
            None => None,
        };
        if segments.next().is_some() {
            return Err(invalid("too many path segments"));
        }

        let mut uri = Self {
            resource_type,
            id,
            ..Self::default()
        };

        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                PAGE_PARAM => uri.page = Some(parse_number(raw, &key, &value)?),
                PAGE_SIZE_PARAM => uri.page_size = Some(parse_number(raw, &key, &value)?),
                _ => {
                    uri.filter
                        .insert(key.into_owned(), Value::String(value.into_owned()));
                }
            }
        }

        if uri.id.is_some() && uri.has_query() {
            return Err(invalid("a resource address takes no query"));
        }
        Ok(uri)
    }

    /// Whether this addresses a collection.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.id.is_none()
    }

    fn has_query(&self) -> bool {
        !self.filter.is_empty() || self.page.is_some() || self.page_size.is_some()
    }

    /// Collection query carried by the URI.
    #[must_use]
    pub fn collection_query(&self) -> CollectionQuery {
        CollectionQuery {
            filter: self.filter.clone(),
            page: self.page.unwrap_or(1),
            page_size: self.page_size,
        }
    }
}

fn parse_number(raw: &str, key: &str, value: &str) -> Result<usize, AffordanceError> {
    value.parse().map_err(|_| {
        AffordanceError::InvalidUri(format!("'{}': {} must be a number, got '{}'", raw, key, value))
    })
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.resource_type)?;
        if let Some(id) = &self.id {
            write!(f, "/{}", id)?;
        }
        if self.has_query() {
            let mut query = form_urlencoded::Serializer::new(String::new());
            for (key, value) in &self.filter {
                query.append_pair(key, &filter_text(value));
            }
            if let Some(page) = self.page {
                query.append_pair(PAGE_PARAM, &page.to_string());
            }
            if let Some(size) = self.page_size {
                query.append_pair(PAGE_SIZE_PARAM, &size.to_string());
            }
            write!(f, "?{}", query.finish())?;
        }
        Ok(())
    }
}

// =============================================================================
// VERBS
// =============================================================================

/// Result of `explore`: one resource or one collection page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Explored {
    Resource(Resource),
    Collection(Collection),
}

impl Explored {
    /// Serialize to the transfer representation.
    pub fn to_json(&self) -> Result<Value, AffordanceError> {
        serde_json::to_value(self).map_err(|e| AffordanceError::SerializationError(e.to_string()))
    }
}

impl<S: Storage> Store<S> {
    /// Read the resource or collection page a URI names.
    pub fn explore(&self, uri: &str) -> Result<Explored, AffordanceError> {
        let uri = ResourceUri::parse(uri)?;
        match &uri.id {
            Some(id) => self
                .get(&uri.resource_type, id)?
                .map(Explored::Resource)
                .ok_or_else(|| AffordanceError::not_found(&uri.resource_type, id)),
            None => self
                .get_collection(&uri.resource_type, &uri.collection_query())
                .map(Explored::Collection),
        }
    }

    /// Invoke an action on the resource a URI names.
    pub fn act(
        &mut self,
        uri: &str,
        action: &str,
        payload: Properties,
    ) -> Result<Option<Resource>, AffordanceError> {
        let parsed = ResourceUri::parse(uri)?;
        let Some(id) = parsed.id else {
            return Err(AffordanceError::InvalidUri(format!(
                "'{}': actions need a resource address",
                uri
            )));
        };
        self.perform_action(&parsed.resource_type, &id, action, payload)
    }

    /// Create a resource in the collection a URI names.
    ///
    /// `/{type}/{id}` creates with that id.
    pub fn create_at(
        &mut self,
        uri: &str,
        mut payload: Properties,
    ) -> Result<Resource, AffordanceError> {
        let parsed = ResourceUri::parse(uri)?;
        if parsed.has_query() {
            return Err(AffordanceError::InvalidUri(format!(
                "'{}': create takes no query",
                uri
            )));
        }
        if let Some(id) = parsed.id {
            match payload.get("id") {
                Some(existing) if existing.as_str() != Some(id.as_str()) => {
                    return Err(AffordanceError::ValidationError(format!(
                        "payload id {} disagrees with uri id '{}'",
                        existing, id
                    )));
                }
                _ => {
                    payload.insert("id".to_string(), Value::String(id));
                }
            }
        }
        self.create(&parsed.resource_type, payload)
    }
}

// =============================================================================
// TESTS
// =============================================================================
