//! Generic paginated query and projection pipeline.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::compare::compare_total;
use super::projection::{Projected, ProjectionShape, column_kind, project, project_value};
use super::repos::{FilterValue, FindPage, PageQuery, RelationLoader, RepoError};
use crate::domain::types::SortOrder;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Caller-supplied listing parameters. Missing or zero `page`/`limit` fall
/// back to [`DEFAULT_PAGE`] and [`DEFAULT_LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryArgs {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub order: Vec<(String, SortOrder)>,
}

impl QueryArgs {
    pub fn page(&self) -> u32 {
        self.page.filter(|page| *page > 0).unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit.filter(|limit| *limit > 0).unwrap_or(DEFAULT_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    pub fn with_page(mut self, page: u32, limit: u32) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order.push((field.into(), order));
        self
    }

    pub fn to_page_query(&self) -> PageQuery {
        PageQuery {
            filters: self.filters.clone(),
            order: self.order.clone(),
            limit: self.limit(),
            offset: self.offset(),
        }
    }
}

/// One page of projected rows plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    pub payloads: Vec<T>,
    pub total: u64,
}

/// Relation attached to every projected row under `relation_field`.
pub struct RelatedProjection<'a, L: ?Sized> {
    pub relation_field: &'static str,
    pub shape: ProjectionShape,
    pub loader: &'a L,
}

/// Loader used when no relation is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelation;

#[async_trait]
impl<E: Sync> RelationLoader<E> for NoRelation {
    type Related = Value;

    async fn load_relation(
        &self,
        _entity: &E,
        _field: &'static str,
    ) -> Result<Option<Value>, RepoError> {
        Ok(None)
    }
}

/// Fetch one page from `source` and project it through `shape`.
pub async fn query_page<S>(
    source: &S,
    args: &QueryArgs,
    shape: &ProjectionShape,
) -> Result<QueryResult<Projected>, RepoError>
where
    S: FindPage + ?Sized,
{
    query_results::<S, NoRelation>(source, args, shape, None).await
}

/// Fetch one page from `source`, project each row through `shape` and, when
/// `related` is given, resolve and attach the related projection per row.
///
/// Rows are processed concurrently; `payloads` keeps the order returned by
/// the source. The first failure aborts the whole call.
pub async fn query_results<S, L>(
    source: &S,
    args: &QueryArgs,
    shape: &ProjectionShape,
    related: Option<&RelatedProjection<'_, L>>,
) -> Result<QueryResult<Projected>, RepoError>
where
    S: FindPage + ?Sized,
    L: RelationLoader<S::Entity> + ?Sized,
{
    let query = args.to_page_query();
    let (items, total) = source.find_page(&query).await?;

    let payloads = try_join_all(items.iter().map(|item| project_row(item, shape, related))).await?;

    debug!(
        target = "tenancy::query",
        shape = shape.name(),
        relation = related.map(|r| r.relation_field).unwrap_or(""),
        limit = query.limit,
        offset = query.offset,
        returned = payloads.len(),
        total,
        "query page projected"
    );

    Ok(QueryResult { payloads, total })
}

async fn project_row<E, L>(
    item: &E,
    shape: &ProjectionShape,
    related: Option<&RelatedProjection<'_, L>>,
) -> Result<Projected, RepoError>
where
    E: Serialize + Sync,
    L: RelationLoader<E> + ?Sized,
{
    let related_value = match related {
        Some(relation) => relation
            .loader
            .load_relation(item, relation.relation_field)
            .await?
            .map(|value| serde_json::to_value(value).map_err(RepoError::from_persistence))
            .transpose()?,
        None => None,
    };

    let mut dto = project(item, shape)?;

    if let (Some(relation), Some(value)) = (related, related_value) {
        if !value.is_null() {
            dto.attach(relation.relation_field, project_value(&value, &relation.shape)?);
        }
    }

    Ok(dto)
}

/// Stable reorder of already fetched rows on `field`. Rows missing the field
/// go last; a column mixing kinds is grouped by kind first.
pub fn sort_payloads(payloads: &mut [Projected], field: &str, order: SortOrder) {
    let kind = column_kind(payloads, field);
    payloads.sort_by(|a, b| {
        compare_total(a.field_value(field, kind), b.field_value(field, kind), order)
    });
}
