/// Authentication extractors and utilities
use crate::{context::AppContext, db::account::Account, error::ServiceError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(|t| t.to_string()))
}

/// Authenticated user - extracts and verifies the session token, then loads
/// the account it names. Any failure along the way is a 401; nothing is
/// partially trusted.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            ServiceError::Authentication("Missing authorization header".to_string())
        })?;

        let account_id = state.tokens.verify_session_token(&token)?;

        // A valid signature over an id that no longer resolves is still a 401
        let account = state
            .accounts
            .get_account(&account_id)
            .await
            .map_err(|_| ServiceError::Authentication("Invalid session token".to_string()))?;

        Ok(AuthUser { account })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn rejects_non_bearer_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert!(extract_bearer_token(&headers).is_none());

        let empty = HeaderMap::new();
        assert!(extract_bearer_token(&empty).is_none());
    }
}
