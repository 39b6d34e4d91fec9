#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tenancy::application::compare::{FieldValue, Sortable, sort_records};
use tenancy::application::healthcheck::HealthProbe;
use tenancy::application::repos::{FilterValue, FindPage, PageQuery, RelationLoader, RepoError};
use tenancy::application::users::{ROLE_FILTER, ROLE_RELATION, UserField};
use tenancy::domain::entities::{RoleRecord, UserRecord};
use tenancy::domain::types::Role;
use time::macros::datetime;
use tokio::sync::Mutex;

pub const ADMIN_ROLE_ID: i64 = 2;
pub const USER_ROLE_ID: i64 = 3;

pub fn roles() -> Vec<RoleRecord> {
    [
        (1, Role::GlobalAdmin),
        (ADMIN_ROLE_ID, Role::Admin),
        (USER_ROLE_ID, Role::User),
    ]
    .into_iter()
    .map(|(id, name)| RoleRecord {
        id,
        name,
        description: Some(format!("{name} role")),
        created_at: datetime!(2024-01-01 0:00 UTC),
    })
    .collect()
}

pub fn user(id: i64, role_id: Option<i64>) -> UserRecord {
    let created_at = datetime!(2024-01-01 0:00 UTC) + time::Duration::days(id);
    UserRecord {
        id,
        email: format!("user{id:02}@example.com"),
        display_name: format!("User {id}"),
        password_hash: format!("$argon2id$v=19$secret-{id}"),
        role_id,
        created_at,
        updated_at: created_at,
    }
}

/// `count` users; every third one has no role, the rest alternate admin/user.
pub fn users(count: i64) -> Vec<UserRecord> {
    (1..=count)
        .map(|id| {
            let role_id = match id % 3 {
                0 => None,
                1 => Some(ADMIN_ROLE_ID),
                _ => Some(USER_ROLE_ID),
            };
            user(id, role_id)
        })
        .collect()
}

/// In-memory user store with hooks for delaying or failing calls.
#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<Vec<UserRecord>>,
    roles: HashMap<i64, RoleRecord>,
    relation_delays: HashMap<i64, Duration>,
    failing_relation: Option<i64>,
    page_failure: Option<String>,
    unhealthy: Option<String>,
    page_calls: AtomicUsize,
    relation_calls: AtomicUsize,
    relation_completions: AtomicUsize,
}

impl InMemoryUsers {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self {
            users: Mutex::new(users),
            roles: roles().into_iter().map(|role| (role.id, role)).collect(),
            ..Self::default()
        }
    }

    pub fn with_relation_delay(mut self, user_id: i64, delay: Duration) -> Self {
        self.relation_delays.insert(user_id, delay);
        self
    }

    pub fn with_failing_relation(mut self, user_id: i64) -> Self {
        self.failing_relation = Some(user_id);
        self
    }

    pub fn with_page_failure(mut self, message: &str) -> Self {
        self.page_failure = Some(message.to_string());
        self
    }

    pub fn unhealthy(mut self, message: &str) -> Self {
        self.unhealthy = Some(message.to_string());
        self
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn relation_calls(&self) -> usize {
        self.relation_calls.load(Ordering::SeqCst)
    }

    /// Relation lookups that ran to a successful end.
    pub fn relation_completions(&self) -> usize {
        self.relation_completions.load(Ordering::SeqCst)
    }

    pub async fn insert(&self, user: UserRecord) {
        self.users.lock().await.push(user);
    }

    fn matches(&self, user: &UserRecord, key: &str, value: &FilterValue) -> Result<bool, RepoError> {
        if key == ROLE_FILTER {
            let FilterValue::Text(name) = value else {
                return Ok(false);
            };
            return Ok(user
                .role_id
                .and_then(|id| self.roles.get(&id))
                .is_some_and(|role| role.name.as_str() == name.as_str()));
        }

        let field = UserField::from_name(key)?;
        Ok(match (user.field_value(field), value) {
            (FieldValue::Text(text), FilterValue::Text(expected)) => text == expected.as_str(),
            (FieldValue::Integer(number), FilterValue::Integer(expected)) => number == *expected,
            _ => false,
        })
    }
}

#[async_trait]
impl FindPage for InMemoryUsers {
    type Entity = UserRecord;

    async fn find_page(&self, query: &PageQuery) -> Result<(Vec<UserRecord>, u64), RepoError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.page_failure {
            return Err(RepoError::Persistence(message.clone()));
        }

        let users = self.users.lock().await;
        let mut matched = Vec::new();
        for user in users.iter() {
            let mut keep = true;
            for (key, value) in &query.filters {
                keep &= self.matches(user, key, value)?;
            }
            if keep {
                matched.push(user.clone());
            }
        }

        for (name, order) in query.order.iter().rev() {
            sort_records(&mut matched, UserField::from_name(name)?, *order);
        }

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl RelationLoader<UserRecord> for InMemoryUsers {
    type Related = RoleRecord;

    async fn load_relation(
        &self,
        user: &UserRecord,
        field: &'static str,
    ) -> Result<Option<RoleRecord>, RepoError> {
        assert_eq!(field, ROLE_RELATION);
        self.relation_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.relation_delays.get(&user.id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_relation == Some(user.id) {
            return Err(RepoError::Timeout);
        }
        self.relation_completions.fetch_add(1, Ordering::SeqCst);
        Ok(user.role_id.and_then(|id| self.roles.get(&id).cloned()))
    }
}

#[async_trait]
impl HealthProbe for InMemoryUsers {
    fn component(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        match &self.unhealthy {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }
}
