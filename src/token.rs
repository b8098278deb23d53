/// Token issuance and verification
///
/// Two independent token kinds:
/// - one-time tokens (email verification, password reset): opaque random hex
///   strings with no embedded structure; expiry is tracked on the account row
/// - session tokens: HS256 JWTs carrying the account id, verifiable without a
///   database round-trip
use crate::{
    config::AuthConfig,
    error::{ServiceError, ServiceResult},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// One-time tokens are 20 random bytes, hex-encoded (160 bits of entropy)
const ONE_TIME_TOKEN_BYTES: usize = 20;

/// Session token claims
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Token issuer service
///
/// Holds the process-wide signing secret; constructed once at startup from
/// the loaded configuration and shared behind an `Arc`.
pub struct TokenIssuer {
    secret: String,
    session_ttl_secs: i64,
}

impl TokenIssuer {
    /// Create a new token issuer
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            session_ttl_secs: config.session_ttl_secs,
        }
    }

    /// Generate a one-time token (verification code, reset token)
    ///
    /// Pure and side-effect-free; the caller is responsible for persisting it.
    pub fn issue_one_time_token() -> String {
        let mut bytes = [0u8; ONE_TIME_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Generate a signed session token for an account
    pub fn issue_session_token(&self, account_id: &str) -> ServiceResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now,
            exp: now + self.session_ttl_secs,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Verify a session token and return the account id it was issued for
    ///
    /// Total over arbitrary input: expired, tampered, and malformed tokens
    /// all map to an `Authentication` error; nothing is partially trusted.
    pub fn verify_session_token(&self, token: &str) -> ServiceResult<String> {
        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        // Allow some clock skew (5 minutes)
        validation.leeway = 300;

        let data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::warn!("session token verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ServiceError::Authentication("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    ServiceError::Authentication("Invalid token signature".to_string())
                }
                _ => ServiceError::Authentication("Invalid token".to_string()),
            }
        })?;

        Ok(data.claims.sub)
    }
}
