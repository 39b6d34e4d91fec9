//! Bearer token verification.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::context::{JwtClaims, TokenPayload};
use crate::domain::types::Role;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("bearer token required")]
    Missing,
    #[error("token expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is malformed")]
    Malformed,
    #[error("role `{role}` may not access this resource")]
    Forbidden { role: Role },
    #[error("token signing failed")]
    Signing,
}

/// HS256 signer and verifier for access tokens.
#[derive(Clone)]
pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a token for `payload`. Without `ttl` the token never expires.
    pub fn issue(&self, payload: &TokenPayload, ttl: Option<Duration>) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;
        let claims = JwtClaims {
            sub: payload.id.to_string(),
            email: payload.email.clone(),
            role: payload.role,
            iat: Some(now),
            exp: ttl.map(|ttl| now + ttl.as_secs()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| AuthError::Signing)
    }

    pub fn verify(&self, token: &str) -> Result<TokenPayload, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims::<&str>(&[]);

        let data = decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|err| {
            match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed,
            }
        })?;

        let claims = data.claims;
        let id = claims.sub.parse::<i64>().map_err(|_| AuthError::Malformed)?;
        Ok(TokenPayload {
            id,
            email: claims.email,
            role: claims.role,
        })
    }
}
