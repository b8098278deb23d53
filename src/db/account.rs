/// Account database model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account record in the database
///
/// `password_hash` and the token fields never leave the service; outward
/// responses go through [`Account::public_info`].
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub verified: bool,
    pub verification_code: Option<String>,
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Public view of an account, safe to serialize in responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Public fields only; secret material is structurally absent
    pub fn public_info(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            verified: self.verified,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_info_excludes_secret_material() {
        let account = Account {
            id: "id-1".to_string(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            name: "Alice".to_string(),
            password_hash: "$argon2id$...".to_string(),
            verified: false,
            verification_code: Some("code".to_string()),
            reset_password_token: Some("token".to_string()),
            reset_password_expires: Some(Utc::now()),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&account.public_info()).unwrap();
        assert!(json.contains("alice"));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("code"));
        assert!(!json.contains("token"));
    }
}
