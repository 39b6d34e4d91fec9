use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{FilterValue, FindPage, PageQuery, RelationLoader, RepoError},
    application::users::{ROLE_FILTER, ROLE_RELATION, UserField},
    domain::entities::{RoleRecord, UserRecord},
    domain::types::{Role, SortOrder},
};

use super::{PostgresRepositories, map_sqlx_error};

const USER_COLUMNS: &str =
    "SELECT id, email, display_name, password_hash, role_id, created_at, updated_at FROM users WHERE 1=1";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    display_name: String,
    password_hash: String,
    role_id: Option<i64>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role_id: row.role_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: OffsetDateTime,
}

impl TryFrom<RoleRow> for RoleRecord {
    type Error = RepoError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: Role::from_str(&row.name).map_err(RepoError::from_persistence)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl FindPage for PostgresRepositories {
    type Entity = UserRecord;

    async fn find_page(&self, query: &PageQuery) -> Result<(Vec<UserRecord>, u64), RepoError> {
        let offset = i64::try_from(query.offset).map_err(|_| RepoError::InvalidInput {
            message: format!("offset {} is out of range", query.offset),
        })?;

        let mut qb = QueryBuilder::new(USER_COLUMNS);
        push_filters(&mut qb, &query.filters)?;
        push_order(&mut qb, &query.order)?;
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(query.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1");
        push_filters(&mut count, &query.filters)?;
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok((
            rows.into_iter().map(UserRecord::from).collect(),
            total.max(0) as u64,
        ))
    }
}

#[async_trait]
impl RelationLoader<UserRecord> for PostgresRepositories {
    type Related = RoleRecord;

    async fn load_relation(
        &self,
        user: &UserRecord,
        field: &'static str,
    ) -> Result<Option<RoleRecord>, RepoError> {
        if field != ROLE_RELATION {
            return Err(RepoError::unknown_field(field));
        }
        let Some(role_id) = user.role_id else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, created_at FROM roles WHERE id = $1",
        )
        .bind(role_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(RoleRecord::try_from).transpose()
    }
}

fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    filters: &BTreeMap<String, FilterValue>,
) -> Result<(), RepoError> {
    for (key, value) in filters {
        if key == ROLE_FILTER {
            qb.push(" AND role_id IN (SELECT id FROM roles WHERE name = ");
            push_filter_value(qb, value);
            qb.push(")");
            continue;
        }
        let field = UserField::from_name(key)?;
        qb.push(" AND ");
        qb.push(field.column());
        qb.push(" = ");
        push_filter_value(qb, value);
    }
    Ok(())
}

fn push_filter_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Bool(flag) => qb.push_bind(*flag),
        FilterValue::Integer(number) => qb.push_bind(*number),
        FilterValue::Text(text) => qb.push_bind(text.clone()),
    };
}

fn push_order(
    qb: &mut QueryBuilder<'_, Postgres>,
    order: &[(String, SortOrder)],
) -> Result<(), RepoError> {
    qb.push(" ORDER BY ");
    let mut orders_by_id = false;
    for (index, (name, direction)) in order.iter().enumerate() {
        let field = UserField::from_name(name)?;
        orders_by_id |= field == UserField::Id;
        if index > 0 {
            qb.push(", ");
        }
        qb.push(field.column());
        qb.push(" ");
        qb.push(direction.as_sql());
    }
    // Stable pagination needs a unique trailing key.
    if !orders_by_id {
        if !order.is_empty() {
            qb.push(", ");
        }
        qb.push("id ASC");
    }
    Ok(())
}
