use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::application::auth::AuthError;
use crate::domain::context::{RequestContext, RoleContext};

use super::HttpState;
use super::error::ApiError;
use super::middleware::RequestId;

/// Verify the bearer token and admit only the roles configured on `state`.
/// The resulting [`RequestContext`] is placed in request and response
/// extensions.
pub async fn require_roles(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match extract_token(request.headers().get(AUTHORIZATION)) {
        Some(token) => token,
        None => return ApiError::from(AuthError::Missing).into_response(),
    };

    let token_data = match state.auth.verify(&token) {
        Ok(payload) => payload,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let ctx = RequestContext {
        request_id,
        token,
        token_data,
        event_channels: None,
    };

    let gate = RoleContext::for_request(&ctx, &state.allowed_roles);
    if !gate.is_allowed() {
        let mut response = ApiError::from(AuthError::Forbidden { role: ctx.role() }).into_response();
        response.extensions_mut().insert(ctx);
        return response;
    }

    debug!(
        target = "tenancy::http::auth",
        user_id = ctx.token_data.id,
        role = ctx.role().as_str(),
        "request authorized"
    );

    request.extensions_mut().insert(ctx.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?.trim();
    (!bearer.is_empty()).then(|| bearer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_required() {
        let value = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(extract_token(Some(&value)).as_deref(), Some("abc.def.ghi"));

        let value = HeaderValue::from_static("Basic dXNlcjpwYXNz");
        assert_eq!(extract_token(Some(&value)), None);

        let value = HeaderValue::from_static("Bearer ");
        assert_eq!(extract_token(Some(&value)), None);
        assert_eq!(extract_token(None), None);
    }
}
