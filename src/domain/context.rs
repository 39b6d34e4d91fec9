//! Per-request context shared between the HTTP layer and application services.

use serde::{Deserialize, Serialize};

use crate::domain::types::Role;

/// Identity carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

/// Registered claims of a signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Pub/sub channels a request may be bridged onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChannels {
    pub event_channel: String,
    pub response_channel: String,
}

/// Authenticated request state inserted into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub token: String,
    pub token_data: TokenPayload,
    pub event_channels: Option<EventChannels>,
}

impl RequestContext {
    pub fn role(&self) -> Role {
        self.token_data.role
    }
}

/// Role information evaluated by authorization gates.
#[derive(Debug, Clone, Default)]
pub struct RoleContext {
    pub user_role: Option<Role>,
    pub roles: Vec<Role>,
    pub allowed_roles: Vec<Role>,
}

impl RoleContext {
    pub fn for_request(ctx: &RequestContext, allowed_roles: &[Role]) -> Self {
        Self {
            user_role: Some(ctx.role()),
            roles: vec![ctx.role()],
            allowed_roles: allowed_roles.to_vec(),
        }
    }

    /// True when any held role is in the allowed set. An empty allowed set
    /// admits every authenticated caller.
    pub fn is_allowed(&self) -> bool {
        if self.allowed_roles.is_empty() {
            return true;
        }
        self.roles
            .iter()
            .chain(self.user_role.iter())
            .any(|role| self.allowed_roles.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> RequestContext {
        RequestContext {
            request_id: "req-1".to_string(),
            token: "token".to_string(),
            token_data: TokenPayload {
                id: 7,
                email: "ops@example.com".to_string(),
                role,
            },
            event_channels: None,
        }
    }

    #[test]
    fn operators_pass_the_gate() {
        let gate = RoleContext::for_request(&ctx(Role::Admin), &Role::operators());
        assert!(gate.is_allowed());
        let gate = RoleContext::for_request(&ctx(Role::GlobalAdmin), &Role::operators());
        assert!(gate.is_allowed());
    }

    #[test]
    fn plain_users_are_refused() {
        let gate = RoleContext::for_request(&ctx(Role::User), &Role::operators());
        assert!(!gate.is_allowed());
    }

    #[test]
    fn empty_allow_list_admits_everyone() {
        let gate = RoleContext::for_request(&ctx(Role::User), &[]);
        assert!(gate.is_allowed());
    }
}
