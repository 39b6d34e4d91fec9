//! Repository traits describing persistence adapters.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::projection::ProjectionError;
use crate::domain::types::SortOrder;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("field `{field}` cannot be used to filter or order this collection")]
    UnknownField { field: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }
}

/// Value matched by an equality filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// Normalized request handed to a [`FindPage`] adapter. `filters` and `order`
/// name fields of the persisted entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PageQuery {
    pub filters: BTreeMap<String, FilterValue>,
    pub order: Vec<(String, SortOrder)>,
    pub limit: u32,
    pub offset: u64,
}

/// Counted, filtered, paginated fetch.
///
/// `total` must be computed over the same filter predicate that produced the
/// page, ignoring `limit` and `offset`.
#[async_trait]
pub trait FindPage: Send + Sync {
    type Entity: Serialize + Send + Sync;

    async fn find_page(&self, query: &PageQuery) -> Result<(Vec<Self::Entity>, u64), RepoError>;
}

/// Lazily materialized relation of an entity. `Ok(None)` means the relation
/// is empty.
#[async_trait]
pub trait RelationLoader<E: Sync>: Send + Sync {
    type Related: Serialize + Send;

    async fn load_relation(
        &self,
        entity: &E,
        field: &'static str,
    ) -> Result<Option<Self::Related>, RepoError>;
}
