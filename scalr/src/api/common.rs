//! JSON:API document types shared by every Scalr endpoint

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Single-resource response document
#[derive(Debug, Deserialize)]
pub struct Document<T> {
    pub data: T,
}

/// Collection response document
#[derive(Debug, Deserialize)]
pub struct ListDocument<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<ListMeta>,
}

impl<T> ListDocument<T> {
    pub fn pagination(&self) -> Option<Pagination> {
        self.meta.as_ref().and_then(|m| m.pagination)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListMeta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    #[serde(default)]
    pub next_page: Option<u32>,
    #[serde(default)]
    pub prev_page: Option<u32>,
    #[serde(default)]
    pub total_count: Option<u32>,
}

/// A resource object as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceObject<A> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: A,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
}

impl<A> ResourceObject<A> {
    /// ID of a to-one relationship, if present and set
    pub fn related_id(&self, name: &str) -> Option<&str> {
        match self.relationships.get(name).map(|r| &r.data) {
            Some(RelationshipData::One(Some(identifier))) => Some(identifier.id.as_str()),
            _ => None,
        }
    }

    /// IDs of a to-many relationship in API order; empty when absent
    pub fn related_ids(&self, name: &str) -> Vec<String> {
        match self.relationships.get(name).map(|r| &r.data) {
            Some(RelationshipData::Many(items)) => items.iter().map(|i| i.id.clone()).collect(),
            Some(RelationshipData::One(Some(identifier))) => vec![identifier.id.clone()],
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: RelationshipData,
}

impl Relationship {
    pub fn one(kind: &str, id: impl Into<String>) -> Self {
        Self {
            data: RelationshipData::One(Some(ResourceIdentifier::new(kind, id))),
        }
    }

    /// An explicit `null` to-one relationship, used to unset a link
    pub fn none() -> Self {
        Self {
            data: RelationshipData::One(None),
        }
    }

    pub fn many<I, S>(kind: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: RelationshipData::Many(
                ids.into_iter()
                    .map(|id| ResourceIdentifier::new(kind, id))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RelationshipData {
    Many(Vec<ResourceIdentifier>),
    One(Option<ResourceIdentifier>),
}

impl Default for RelationshipData {
    fn default() -> Self {
        RelationshipData::One(None)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(kind: &str, id: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.into(),
        }
    }
}

/// Request document for create and update calls
#[derive(Debug, Serialize)]
pub struct NewDocument<A> {
    pub data: NewResource<A>,
}

#[derive(Debug, Serialize)]
pub struct NewResource<A> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub attributes: A,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub relationships: HashMap<String, Relationship>,
}

impl<A> NewDocument<A> {
    pub fn new(kind: &'static str, attributes: A) -> Self {
        Self {
            data: NewResource {
                kind,
                id: None,
                attributes,
                relationships: HashMap::new(),
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.data.id = Some(id.into());
        self
    }

    pub fn relationship(mut self, name: &str, relationship: Relationship) -> Self {
        self.data.relationships.insert(name.to_string(), relationship);
        self
    }
}

/// Body of `relationships/*` add and remove calls
#[derive(Debug, Serialize)]
pub struct RelationshipDocument {
    pub data: Vec<ResourceIdentifier>,
}

impl RelationshipDocument {
    pub fn new<I, S>(kind: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: ids
                .into_iter()
                .map(|id| ResourceIdentifier::new(kind, id))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorObject {
    fn message(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => format!("{}: {}", title, detail),
            (Some(text), None) | (None, Some(text)) => text.clone(),
            (None, None) => self.status.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug)]
pub struct ApiErrorDetails {
    pub errors: Vec<ErrorObject>,
}

impl ApiErrorDetails {
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ErrorObject::message)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

impl std::error::Error for ApiErrorDetails {}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

/// Percent-encodes an id for use as a single URL path segment
pub fn segment(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}
