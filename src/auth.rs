//! Admin capability gate.
//!
//! Authentication policy lives in the gateway; this crate only needs to
//! know whether a request carries admin visibility. Override writes and
//! maintenance endpoints extract [`AdminClaims`]; everything else is open
//! to the routing layer's own guards.

use axum::http::{header::AUTHORIZATION, request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    /// Expiry, seconds since epoch.
    pub exp: usize,
    #[serde(default)]
    pub is_admin: bool,
}

/// Issues a signed token. Used by ops tooling and tests; interactive login
/// happens upstream.
pub fn issue_token(
    secret: &str,
    subject: &str,
    is_admin: bool,
    ttl_secs: usize,
) -> Result<String, ServiceError> {
    let claims = Claims {
        sub: subject.to_string(),
        exp: Utc::now().timestamp() as usize + ttl_secs,
        is_admin,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("token issue failed: {}", e)))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))
}

/// Extractor that admits only requests with admin visibility.
#[derive(Debug, Clone)]
pub struct AdminClaims(pub Claims);

#[axum::async_trait]
impl axum::extract::FromRequestParts<AppState> for AdminClaims {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing Authorization header".to_string())
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("expected Bearer authorization".to_string())
        })?;

        let claims = verify_token(&state.config.jwt_secret, token)?;
        if !claims.is_admin {
            return Err(ServiceError::Forbidden(
                "admin capability required".to_string(),
            ));
        }

        Ok(AdminClaims(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

    #[test]
    fn issued_tokens_verify_and_carry_capability() {
        let token = issue_token(SECRET, "ops@example.com", true, 60).unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, "ops@example.com");
        assert!(claims.is_admin);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let token = issue_token(SECRET, "ops@example.com", true, 60).unwrap();
        let err = verify_token("another_secret_key_with_32_chars!!", &token).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn non_admin_tokens_verify_without_capability() {
        let token = issue_token(SECRET, "seller@example.com", false, 60).unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert!(!claims.is_admin);
    }
}
