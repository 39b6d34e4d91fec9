mod support;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tenancy::application::query::{QueryArgs, RelatedProjection, query_page, query_results};
use tenancy::application::repos::{RelationLoader, RepoError};
use tenancy::application::users::{ROLE_RELATION, role_shape, user_shape};
use tenancy::domain::entities::UserRecord;
use tenancy::domain::types::SortOrder;

use support::{InMemoryUsers, user, users};

fn role_relation(store: &InMemoryUsers) -> RelatedProjection<'_, InMemoryUsers> {
    RelatedProjection {
        relation_field: ROLE_RELATION,
        shape: role_shape(),
        loader: store,
    }
}

fn ids(payloads: &[tenancy::application::projection::Projected]) -> Vec<i64> {
    payloads
        .iter()
        .map(|p| p.get("id").and_then(|id| id.as_i64()).expect("id projected"))
        .collect()
}

#[tokio::test]
async fn second_page_skips_first_ten_rows() {
    let store = InMemoryUsers::new(users(25));
    let args = QueryArgs::default()
        .with_page(2, 10)
        .order_by("id", SortOrder::Asc);

    let result = query_results(&store, &args, &user_shape(), Some(&role_relation(&store)))
        .await
        .expect("page loads");

    assert_eq!(result.total, 25);
    assert_eq!(result.payloads.len(), 10);
    assert_eq!(ids(&result.payloads), (11..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn last_page_is_partial() {
    let store = InMemoryUsers::new(users(25));
    let args = QueryArgs::default().with_page(3, 10);

    let result = query_page(&store, &args, &user_shape()).await.unwrap();

    assert_eq!(result.total, 25);
    assert_eq!(result.payloads.len(), 5);
}

#[tokio::test]
async fn page_past_the_end_is_empty_but_counted() {
    let store = InMemoryUsers::new(users(5));
    let args = QueryArgs::default().with_page(4, 10);

    let result = query_page(&store, &args, &user_shape()).await.unwrap();

    assert!(result.payloads.is_empty());
    assert_eq!(result.total, 5);
}

#[tokio::test]
async fn defaults_apply_when_paging_is_missing() {
    let store = InMemoryUsers::new(users(25));

    let result = query_page(&store, &QueryArgs::default(), &user_shape())
        .await
        .unwrap();

    assert_eq!(result.payloads.len(), 10);
    assert_eq!(ids(&result.payloads)[0], 1);
}

#[tokio::test]
async fn only_allow_listed_fields_leave_the_pipeline() {
    let store = InMemoryUsers::new(users(6));

    let result = query_results(
        &store,
        &QueryArgs::default(),
        &user_shape(),
        Some(&role_relation(&store)),
    )
    .await
    .unwrap();

    for payload in &result.payloads {
        assert!(!payload.contains("password_hash"));
        assert!(!payload.contains("role_id"));
        assert!(!payload.contains("updated_at"));
        if let Some(role) = payload.get(ROLE_RELATION) {
            let keys: Vec<_> = role.as_object().unwrap().keys().cloned().collect();
            assert_eq!(keys.len(), 2);
            assert!(role.get("description").is_none());
            assert!(role.get("created_at").is_none());
        }
    }
}

#[tokio::test]
async fn related_projection_is_nested_per_row() {
    let store = InMemoryUsers::new(vec![
        user(1, Some(support::ADMIN_ROLE_ID)),
        user(2, None),
    ]);

    let result = query_results(
        &store,
        &QueryArgs::default(),
        &user_shape(),
        Some(&role_relation(&store)),
    )
    .await
    .unwrap();

    let first = &result.payloads[0];
    assert_eq!(
        first.get(ROLE_RELATION),
        Some(&json!({ "id": support::ADMIN_ROLE_ID, "name": "admin" }))
    );

    // A user without a role gets no relation key at all, not a null.
    let second = &result.payloads[1];
    assert!(!second.contains(ROLE_RELATION));
    assert_eq!(second.get("email"), Some(&json!("user02@example.com")));
}

#[tokio::test]
async fn without_a_relation_nothing_is_resolved() {
    let store = InMemoryUsers::new(users(3));

    let result = query_page(&store, &QueryArgs::default(), &user_shape())
        .await
        .unwrap();

    assert_eq!(store.relation_calls(), 0);
    assert!(result.payloads.iter().all(|p| !p.contains(ROLE_RELATION)));
}

#[tokio::test]
async fn source_order_survives_out_of_order_resolution() {
    let store = InMemoryUsers::new(users(5))
        .with_relation_delay(1, Duration::from_millis(60))
        .with_relation_delay(2, Duration::from_millis(45))
        .with_relation_delay(3, Duration::from_millis(30))
        .with_relation_delay(4, Duration::from_millis(15));
    let args = QueryArgs::default().order_by("id", SortOrder::Asc);

    let result = query_results(&store, &args, &user_shape(), Some(&role_relation(&store)))
        .await
        .unwrap();

    assert_eq!(ids(&result.payloads), vec![1, 2, 3, 4, 5]);
    assert_eq!(store.relation_calls(), 5);
}

#[tokio::test]
async fn descending_source_order_is_kept() {
    let store = InMemoryUsers::new(users(12));
    let args = QueryArgs::default()
        .with_page(1, 4)
        .order_by("created_at", SortOrder::Desc);

    let result = query_page(&store, &args, &user_shape()).await.unwrap();

    assert_eq!(ids(&result.payloads), vec![12, 11, 10, 9]);
}

#[tokio::test]
async fn source_failure_is_propagated() {
    let store = InMemoryUsers::new(users(5)).with_page_failure("connection reset");

    let err = query_results(
        &store,
        &QueryArgs::default(),
        &user_shape(),
        Some(&role_relation(&store)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RepoError::Persistence(message) if message == "connection reset"));
    assert_eq!(store.relation_calls(), 0);
}

#[tokio::test]
async fn relation_failure_fails_the_whole_page() {
    let store = InMemoryUsers::new(users(5)).with_failing_relation(4);

    let err = query_results(
        &store,
        &QueryArgs::default(),
        &user_shape(),
        Some(&role_relation(&store)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RepoError::Timeout));
}

#[tokio::test]
async fn first_relation_failure_abandons_pending_lookups() {
    let slow = Duration::from_millis(200);
    let store = InMemoryUsers::new(users(5))
        .with_relation_delay(1, slow)
        .with_relation_delay(2, slow)
        .with_relation_delay(3, slow)
        .with_relation_delay(4, slow)
        .with_failing_relation(5);

    let err = query_results(
        &store,
        &QueryArgs::default(),
        &user_shape(),
        Some(&role_relation(&store)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RepoError::Timeout));

    // Rows 1-4 were in flight when row 5 failed; dropped, they never finish.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.relation_calls(), 5);
    assert_eq!(store.relation_completions(), 0);
}

/// Loader whose relation serializes to JSON null for every row.
struct NullRelation;

#[async_trait]
impl RelationLoader<UserRecord> for NullRelation {
    type Related = Value;

    async fn load_relation(
        &self,
        _user: &UserRecord,
        _field: &'static str,
    ) -> Result<Option<Value>, RepoError> {
        Ok(Some(Value::Null))
    }
}

#[tokio::test]
async fn null_relation_values_are_not_attached() {
    let store = InMemoryUsers::new(users(3));
    let related = RelatedProjection {
        relation_field: ROLE_RELATION,
        shape: role_shape(),
        loader: &NullRelation,
    };

    let result = query_results(&store, &QueryArgs::default(), &user_shape(), Some(&related))
        .await
        .unwrap();

    assert_eq!(result.payloads.len(), 3);
    assert!(result.payloads.iter().all(|p| !p.contains(ROLE_RELATION)));
}

#[tokio::test]
async fn filters_narrow_page_and_total_alike() {
    let store = InMemoryUsers::new(users(25));
    let args = QueryArgs::default()
        .with_page(1, 3)
        .filter("role_id", support::ADMIN_ROLE_ID);

    let result = query_page(&store, &args, &user_shape()).await.unwrap();

    // ids 1, 4, 7, ... 25 hold the admin role.
    assert_eq!(result.total, 9);
    assert_eq!(ids(&result.payloads), vec![1, 4, 7]);
}

#[tokio::test]
async fn unknown_order_fields_are_rejected() {
    let store = InMemoryUsers::new(users(3));
    let args = QueryArgs::default().order_by("password_hash", SortOrder::Asc);

    let err = query_page(&store, &args, &user_shape()).await.unwrap_err();

    assert!(matches!(err, RepoError::UnknownField { field } if field == "password_hash"));
}
