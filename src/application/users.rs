//! Tenant user listings.

use std::sync::Arc;

use tracing::debug;

use super::compare::{FieldValue, Sortable};
use super::error::AppError;
use super::projection::{Projected, ProjectionShape};
use super::query::{QueryArgs, QueryResult, RelatedProjection, query_results, sort_payloads};
use super::repos::{FindPage, RelationLoader, RepoError};
use crate::cache::{CacheConfig, CacheDomain, QueryCache, derive_cache_key};
use crate::domain::entities::{RoleRecord, UserRecord};
use crate::domain::types::{Role, SortOrder};

/// Name of the lazy relation attached to listed users.
pub const ROLE_RELATION: &str = "role";
/// Filter key matching users by role name rather than role id.
pub const ROLE_FILTER: &str = "role";

/// Persisted user fields that may be filtered or ordered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Id,
    Email,
    DisplayName,
    RoleId,
    CreatedAt,
    UpdatedAt,
}

impl UserField {
    pub const ALL: [UserField; 6] = [
        UserField::Id,
        UserField::Email,
        UserField::DisplayName,
        UserField::RoleId,
        UserField::CreatedAt,
        UserField::UpdatedAt,
    ];

    pub fn column(self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Email => "email",
            UserField::DisplayName => "display_name",
            UserField::RoleId => "role_id",
            UserField::CreatedAt => "created_at",
            UserField::UpdatedAt => "updated_at",
        }
    }

    /// Resolve a caller-supplied field name. Anything outside the allow-list,
    /// `password_hash` included, is rejected.
    pub fn from_name(name: &str) -> Result<Self, RepoError> {
        Self::ALL
            .into_iter()
            .find(|field| field.column() == name)
            .ok_or_else(|| RepoError::unknown_field(name))
    }
}

impl Sortable for UserRecord {
    type Field = UserField;

    fn field_value(&self, field: UserField) -> FieldValue<'_> {
        match field {
            UserField::Id => self.id.into(),
            UserField::Email => self.email.as_str().into(),
            UserField::DisplayName => self.display_name.as_str().into(),
            UserField::RoleId => self.role_id.map(FieldValue::from).unwrap_or(FieldValue::Other),
            UserField::CreatedAt => self.created_at.into(),
            UserField::UpdatedAt => self.updated_at.into(),
        }
    }
}

/// Storage port for users: paged fetch plus the lazy role relation.
pub trait UsersRepo:
    FindPage<Entity = UserRecord> + RelationLoader<UserRecord, Related = RoleRecord>
{
}

impl<T> UsersRepo for T where
    T: FindPage<Entity = UserRecord> + RelationLoader<UserRecord, Related = RoleRecord>
{
}

pub fn user_shape() -> ProjectionShape {
    ProjectionShape::new("UserDto")
        .expose("id")
        .expose("email")
        .expose("display_name")
        .expose("created_at")
}

pub fn role_shape() -> ProjectionShape {
    ProjectionShape::new("RoleDto").expose("id").expose("name")
}

/// Listing request as accepted from callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListUsersRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<Role>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl ListUsersRequest {
    fn to_args(&self) -> Result<(QueryArgs, Option<UserField>), RepoError> {
        let mut args = QueryArgs {
            page: self.page,
            limit: self.limit,
            ..QueryArgs::default()
        };
        if let Some(role) = self.role {
            args = args.filter(ROLE_FILTER, role.as_str());
        }
        let sort = self.sort_by.as_deref().map(UserField::from_name).transpose()?;
        let order_field = sort.unwrap_or(UserField::Id);
        args = args.order_by(order_field.column(), self.sort_order);
        Ok((args, sort))
    }
}

pub struct UserService {
    repo: Arc<dyn UsersRepo>,
    cache: Option<Arc<QueryCache>>,
    cache_config: CacheConfig,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UsersRepo>,
        cache: Option<Arc<QueryCache>>,
        cache_config: CacheConfig,
    ) -> Self {
        let cache = cache.filter(|_| cache_config.enabled);
        Self {
            repo,
            cache,
            cache_config,
        }
    }

    /// One page of users projected through [`user_shape`], each carrying its
    /// role projected through [`role_shape`] when the user has one.
    ///
    /// Pages are cached under the `user:get:list` domain. The store orders and
    /// slices the rows; the returned page is then re-sorted in memory on the
    /// requested field. That re-sort only orders rows within the page, so
    /// which rows land on which page still follows the store's ordering.
    pub async fn list_users(
        &self,
        request: &ListUsersRequest,
    ) -> Result<QueryResult<Projected>, AppError> {
        let (args, sort) = request.to_args()?;
        let record = derive_cache_key(CacheDomain::UserList, &self.cache_config);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&record, &args) {
                debug!(
                    target = "tenancy::users",
                    cache_key = %record.cache_key,
                    returned = hit.payloads.len(),
                    "user listing served from cache"
                );
                return Ok(hit);
            }
        }

        let relation = RelatedProjection {
            relation_field: ROLE_RELATION,
            shape: role_shape(),
            loader: self.repo.as_ref(),
        };
        let mut result =
            query_results(self.repo.as_ref(), &args, &user_shape(), Some(&relation)).await?;

        if let Some(field) = sort {
            sort_payloads(&mut result.payloads, field.column(), request.sort_order);
        }

        if let Some(cache) = &self.cache {
            cache.put(&record, &args, result.clone());
        }
        Ok(result)
    }

    /// Drop every cached user listing. Returns the number of pages dropped.
    pub fn invalidate_user_lists(&self) -> usize {
        match &self.cache {
            Some(cache) => {
                let record = derive_cache_key(CacheDomain::UserList, &self.cache_config);
                cache.invalidate(&record)
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::compare::sort_records;

    fn user(id: i64, email: &str) -> UserRecord {
        UserRecord {
            id,
            email: email.to_string(),
            display_name: email.to_uppercase(),
            password_hash: "hash".to_string(),
            role_id: None,
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    #[test]
    fn allow_listed_fields_resolve() {
        assert_eq!(UserField::from_name("email").unwrap(), UserField::Email);
        assert_eq!(UserField::from_name("role_id").unwrap(), UserField::RoleId);
    }

    #[test]
    fn secrets_are_not_sortable() {
        let err = UserField::from_name("password_hash").unwrap_err();
        assert!(matches!(err, RepoError::UnknownField { field } if field == "password_hash"));
    }

    #[test]
    fn records_sort_by_field() {
        let mut users = vec![user(2, "bob@x"), user(1, "Carol@x"), user(3, "alice@x")];
        sort_records(&mut users, UserField::Email, SortOrder::Asc);
        let ids: Vec<_> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, [3, 2, 1]);

        sort_records(&mut users, UserField::Id, SortOrder::Desc);
        let ids: Vec<_> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, [3, 2, 1]);
    }

    #[test]
    fn request_defaults_to_id_order() {
        let (args, sort) = ListUsersRequest::default().to_args().unwrap();
        assert_eq!(sort, None);
        assert_eq!(args.order, vec![("id".to_string(), SortOrder::Asc)]);
        assert!(args.filters.is_empty());
    }

    #[test]
    fn request_carries_role_filter_and_sort() {
        let request = ListUsersRequest {
            page: Some(2),
            limit: Some(5),
            role: Some(Role::Admin),
            sort_by: Some("email".to_string()),
            sort_order: SortOrder::Desc,
        };
        let (args, sort) = request.to_args().unwrap();
        assert_eq!(sort, Some(UserField::Email));
        assert_eq!(args.offset(), 5);
        assert_eq!(
            args.filters.get(ROLE_FILTER),
            Some(&crate::application::repos::FilterValue::Text("admin".to_string()))
        );
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let request = ListUsersRequest {
            sort_by: Some("password_hash".to_string()),
            ..ListUsersRequest::default()
        };
        assert!(request.to_args().is_err());
    }

    #[test]
    fn user_projection_hides_password_hash() {
        let shape = user_shape();
        assert!(!shape.exposes("password_hash"));
        let dto = crate::application::projection::project(&user(1, "a@x"), &shape).unwrap();
        assert!(!dto.contains("password_hash"));
        assert_eq!(dto.len(), 4);
    }
}
