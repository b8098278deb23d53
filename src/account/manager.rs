/// Account manager implementation using runtime queries
///
/// Implements the credential lifecycle: register, verify, authenticate,
/// request/confirm password reset. Single-use tokens are consumed with
/// conditional UPDATEs so two concurrent requests can never both spend the
/// same token.

use crate::{
    account::RegisterRequest,
    config::ServerConfig,
    db::account::Account,
    error::{ServiceError, ServiceResult},
    mailer::Mailer,
    password,
    token::TokenIssuer,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    tokens: Arc<TokenIssuer>,
    mailer: Arc<Mailer>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(
        db: SqlitePool,
        config: Arc<ServerConfig>,
        tokens: Arc<TokenIssuer>,
        mailer: Arc<Mailer>,
    ) -> Self {
        Self {
            db,
            config,
            tokens,
            mailer,
        }
    }

    /// Register a new account
    ///
    /// The pre-insert reads give distinguishable error messages; the UNIQUE
    /// constraints on username and email are the authoritative check, so a
    /// racing duplicate insert still comes back as a Conflict.
    pub async fn register(&self, req: RegisterRequest) -> ServiceResult<Account> {
        if self.username_exists(&req.username).await? {
            return Err(ServiceError::Conflict("Username is already taken.".to_string()));
        }

        if self.email_exists(&req.email).await? {
            return Err(ServiceError::Conflict(
                "Email is already registered. Did you forget the password? Try resetting it."
                    .to_string(),
            ));
        }

        let password_hash = password::hash_password(&req.password)?;
        let verification_code = TokenIssuer::issue_one_time_token();

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO account (id, username, email, name, password_hash, verified, verification_code, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&id)
        .bind(&req.username)
        .bind(&req.email)
        .bind(&req.name)
        .bind(&password_hash)
        .bind(false)
        .bind(&verification_code)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(classify_unique_violation)?;

        tracing::info!(username = %req.username, "account registered, verification pending");

        self.dispatch_verification_email(
            req.email.clone(),
            req.username.clone(),
            verification_code.clone(),
        );

        Ok(Account {
            id,
            username: req.username,
            email: req.email,
            name: req.name,
            password_hash,
            verified: false,
            verification_code: Some(verification_code),
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
        })
    }

    /// Verify an account using its emailed verification code
    ///
    /// Consume-and-clear in one statement: the code is matched and cleared by
    /// the same UPDATE that flips `verified`, so a second request holding the
    /// same code finds zero rows. Absent, consumed, and never-issued codes
    /// collapse into one outcome.
    pub async fn verify_account(&self, code: &str) -> ServiceResult<()> {
        let result = sqlx::query(
            "UPDATE account SET verified = true, verification_code = NULL
             WHERE verification_code = ?1",
        )
        .bind(code)
        .execute(&self.db)
        .await
        .map_err(ServiceError::Database)?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Invalid verification code.".to_string()));
        }

        tracing::info!("account verified");

        Ok(())
    }

    /// Authenticate with username and password, minting a session token
    ///
    /// Read-only against stored state. Verification is deliberately not
    /// required to log in; tests pin that behavior down.
    pub async fn authenticate(
        &self,
        username: &str,
        password_plain: &str,
    ) -> ServiceResult<(Account, String)> {
        let account = self
            .get_account_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))?;

        if !password::verify_password(password_plain, &account.password_hash) {
            tracing::info!(username = %username, "authentication rejected: wrong password");
            return Err(ServiceError::Authentication("Incorrect password.".to_string()));
        }

        let token = self.tokens.issue_session_token(&account.id)?;

        Ok((account, token))
    }

    /// Start a password reset for the account holding this email
    ///
    /// Sets the reset token and its expiry together in one UPDATE and sends
    /// the reset link by email, best-effort.
    pub async fn request_password_reset(&self, email: &str) -> ServiceResult<()> {
        let account = self
            .get_account_by_email(email)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("No account with that email address exists.".to_string())
            })?;

        let token = TokenIssuer::issue_one_time_token();
        let expires_at = Utc::now() + Duration::seconds(self.config.auth.reset_token_ttl_secs);

        sqlx::query(
            "UPDATE account SET reset_password_token = ?1, reset_password_expires = ?2
             WHERE id = ?3",
        )
        .bind(&token)
        .bind(expires_at)
        .bind(&account.id)
        .execute(&self.db)
        .await
        .map_err(ServiceError::Database)?;

        tracing::info!(username = %account.username, "password reset requested");

        self.dispatch_password_reset_email(account.email, account.username, token);

        Ok(())
    }

    /// Check whether a reset token is known and unexpired
    ///
    /// Read-only; callers use it before rendering the reset form. The
    /// confirm step re-checks the same precondition, so nothing here is
    /// trusted across time.
    pub async fn validate_reset_token(&self, token: &str) -> ServiceResult<()> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM account
             WHERE reset_password_token = ?1 AND reset_password_expires > ?2",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await
        .map_err(ServiceError::Database)?;

        if count == 0 {
            return Err(ServiceError::Authentication(
                "Password reset link is invalid or has expired.".to_string(),
            ));
        }

        Ok(())
    }

    /// Complete a password reset
    ///
    /// The expiry check, hash swap, and token clear happen in one UPDATE;
    /// whichever of two concurrent confirms runs second finds zero rows.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        // Recipient of the confirmation mail; only used if the UPDATE wins.
        let recipient = sqlx::query_as::<_, (String, String)>(
            "SELECT username, email FROM account WHERE reset_password_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .map_err(ServiceError::Database)?;

        let Some((username, email)) = recipient else {
            return Err(ServiceError::Authentication(
                "Password reset link is invalid or has expired.".to_string(),
            ));
        };

        let password_hash = password::hash_password(new_password)?;

        let result = sqlx::query(
            "UPDATE account
             SET password_hash = ?1, reset_password_token = NULL, reset_password_expires = NULL
             WHERE reset_password_token = ?2 AND reset_password_expires > ?3",
        )
        .bind(&password_hash)
        .bind(token)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(ServiceError::Database)?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::Authentication(
                "Password reset link is invalid or has expired.".to_string(),
            ));
        }

        tracing::info!(username = %username, "password reset completed");

        self.dispatch_password_changed_email(email, username);

        Ok(())
    }

    /// Get account by id
    pub async fn get_account(&self, id: &str) -> ServiceResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, email, name, password_hash, verified, verification_code,
                    reset_password_token, reset_password_expires, created_at
             FROM account WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(ServiceError::Database)?
        .ok_or_else(|| ServiceError::NotFound("Account not found.".to_string()))?;

        Ok(account)
    }

    /// Clear reset tokens whose expiry has passed
    ///
    /// Called periodically by the background job so stale reset fields do
    /// not outlive their window. Returns the number of accounts swept.
    pub async fn clear_expired_reset_tokens(&self) -> ServiceResult<u64> {
        let result = sqlx::query(
            "UPDATE account SET reset_password_token = NULL, reset_password_expires = NULL
             WHERE reset_password_expires IS NOT NULL AND reset_password_expires < ?1",
        )
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(ServiceError::Database)?;

        let swept = result.rows_affected();
        if swept > 0 {
            tracing::info!(swept, "cleared expired password reset tokens");
        } else {
            tracing::debug!("reset token sweep: nothing expired");
        }

        Ok(swept)
    }

    /// Get account by username
    async fn get_account_by_username(&self, username: &str) -> ServiceResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, email, name, password_hash, verified, verification_code,
                    reset_password_token, reset_password_expires, created_at
             FROM account WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map_err(ServiceError::Database)?;

        Ok(account)
    }

    /// Get account by email
    async fn get_account_by_email(&self, email: &str) -> ServiceResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, email, name, password_hash, verified, verification_code,
                    reset_password_token, reset_password_expires, created_at
             FROM account WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(ServiceError::Database)?;

        Ok(account)
    }

    /// Check if username exists
    async fn username_exists(&self, username: &str) -> ServiceResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE username = ?1")
            .bind(username)
            .fetch_one(&self.db)
            .await
            .map_err(ServiceError::Database)?;

        Ok(count > 0)
    }

    /// Check if email exists
    async fn email_exists(&self, email: &str) -> ServiceResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await
            .map_err(ServiceError::Database)?;

        Ok(count > 0)
    }

    /// Send the verification email without blocking or failing the caller
    fn dispatch_verification_email(&self, email: String, username: String, code: String) {
        let mailer = Arc::clone(&self.mailer);
        let base_url = self.config.service.public_url.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_verification_email(&email, &username, &code, &base_url)
                .await
            {
                tracing::warn!(error = %e, "failed to send verification email");
            }
        });
    }

    /// Send the password reset email without blocking or failing the caller
    fn dispatch_password_reset_email(&self, email: String, username: String, token: String) {
        let mailer = Arc::clone(&self.mailer);
        let base_url = self.config.service.public_url.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_password_reset_email(&email, &username, &token, &base_url)
                .await
            {
                tracing::warn!(error = %e, "failed to send password reset email");
            }
        });
    }

    /// Send the password-changed notice without blocking or failing the caller
    fn dispatch_password_changed_email(&self, email: String, username: String) {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(e) = mailer.send_password_changed_email(&email, &username).await {
                tracing::warn!(error = %e, "failed to send password changed email");
            }
        });
    }
}

/// Map a UNIQUE constraint violation from the account insert to the same
/// Conflict the pre-checks would have produced
fn classify_unique_violation(e: sqlx::Error) -> ServiceError {
    if let sqlx::Error::Database(ref db_err) = e {
        let message = db_err.message();
        if message.contains("account.username") {
            return ServiceError::Conflict("Username is already taken.".to_string());
        }
        if message.contains("account.email") {
            return ServiceError::Conflict(
                "Email is already registered. Did you forget the password? Try resetting it."
                    .to_string(),
            );
        }
    }
    ServiceError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use std::path::PathBuf;

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 4000,
                public_url: "http://localhost:4000".to_string(),
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                account_db: PathBuf::from(":memory:"),
            },
            auth: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123".to_string(),
                session_ttl_secs: 3600,
                reset_token_ttl_secs: 900,
            },
            email: None,
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    async fn create_test_manager() -> (AccountManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::create_pool(
            &dir.path().join("accounts.sqlite"),
            crate::db::DatabaseOptions::default(),
        )
        .await
        .unwrap();
        crate::db::run_migrations(&db).await.unwrap();

        let config = Arc::new(test_config());
        let tokens = Arc::new(TokenIssuer::new(&config.auth));
        let mailer = Arc::new(Mailer::new(None).unwrap());

        (AccountManager::new(db, config, tokens, mailer), dir)
    }

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "Secret123!".to_string(),
            name: "Test User".to_string(),
        }
    }

    async fn account_count(manager: &AccountManager) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM account")
            .fetch_one(&manager.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_creates_pending_account() {
        let (manager, _dir) = create_test_manager().await;

        let account = manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();

        assert!(!account.verified);
        let code = account.verification_code.as_deref().unwrap();
        assert_eq!(code.len(), 40);
        assert_ne!(account.password_hash, "Secret123!");
        assert_eq!(account_count(&manager).await, 1);

        // Stored row matches the returned state
        let stored = manager.get_account(&account.id).await.unwrap();
        assert!(!stored.verified);
        assert_eq!(stored.verification_code.as_deref(), Some(code));
        assert!(stored.reset_password_token.is_none());
        assert!(stored.reset_password_expires.is_none());
    }

    #[tokio::test]
    async fn register_duplicate_username_is_conflict() {
        let (manager, _dir) = create_test_manager().await;

        manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();

        let result = manager
            .register(register_request("alice", "other@x.com"))
            .await;

        match result {
            Err(ServiceError::Conflict(msg)) => assert!(msg.contains("Username")),
            other => panic!("expected Conflict, got {:?}", other.map(|_| ())),
        }
        assert_eq!(account_count(&manager).await, 1);
    }

    #[tokio::test]
    async fn register_duplicate_email_is_conflict() {
        let (manager, _dir) = create_test_manager().await;

        manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();

        let result = manager.register(register_request("bob", "a@x.com")).await;

        match result {
            Err(ServiceError::Conflict(msg)) => assert!(msg.contains("Email")),
            other => panic!("expected Conflict, got {:?}", other.map(|_| ())),
        }
        assert_eq!(account_count(&manager).await, 1);
    }

    #[tokio::test]
    async fn concurrent_registers_yield_one_success() {
        let (manager, _dir) = create_test_manager().await;
        let manager = Arc::new(manager);

        // Both tasks race through the pre-checks; the UNIQUE constraint
        // decides the winner and the loser must see a Conflict.
        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.register(register_request("alice", "a@x.com")).await })
        };
        let second = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.register(register_request("alice", "a@x.com")).await })
        };

        let results = vec![first.await.unwrap(), second.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::Conflict(_))))
            .count();

        assert_eq!(successes, 1, "exactly one register must win");
        assert_eq!(conflicts, 1, "the loser must see a Conflict");
        assert_eq!(account_count(&manager).await, 1);
    }

    #[tokio::test]
    async fn verify_account_consumes_the_code() {
        let (manager, _dir) = create_test_manager().await;

        let account = manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();
        let code = account.verification_code.unwrap();

        manager.verify_account(&code).await.unwrap();

        let stored = manager.get_account(&account.id).await.unwrap();
        assert!(stored.verified);
        assert!(stored.verification_code.is_none());

        // Second use of the same code fails the same way an unknown one does
        match manager.verify_account(&code).await {
            Err(ServiceError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn verify_unknown_code_is_not_found() {
        let (manager, _dir) = create_test_manager().await;

        match manager.verify_account("never-issued").await {
            Err(ServiceError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn authenticate_works_before_verification() {
        // Verification is not a login gate; an unverified account with the
        // right password gets a session token.
        let (manager, _dir) = create_test_manager().await;

        let account = manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();

        let (authed, token) = manager.authenticate("alice", "Secret123!").await.unwrap();
        assert!(!authed.verified);
        assert_eq!(authed.id, account.id);
        assert_eq!(manager.tokens.verify_session_token(&token).unwrap(), account.id);
    }

    #[tokio::test]
    async fn authenticate_unknown_username_is_not_found() {
        let (manager, _dir) = create_test_manager().await;

        match manager.authenticate("nobody", "Secret123!").await {
            Err(ServiceError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn authenticate_wrong_password_is_rejected() {
        let (manager, _dir) = create_test_manager().await;

        manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();

        match manager.authenticate("alice", "wrong").await {
            Err(ServiceError::Authentication(_)) => {}
            other => panic!("expected Authentication, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn password_reset_flow_end_to_end() {
        let (manager, _dir) = create_test_manager().await;

        let account = manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();

        manager.request_password_reset("a@x.com").await.unwrap();

        let pending = manager.get_account(&account.id).await.unwrap();
        let token = pending.reset_password_token.unwrap();
        let expires = pending.reset_password_expires.unwrap();
        assert!(expires > Utc::now());

        manager.validate_reset_token(&token).await.unwrap();

        manager
            .confirm_password_reset(&token, "NewPass1!")
            .await
            .unwrap();

        // Reset fields cleared together
        let after = manager.get_account(&account.id).await.unwrap();
        assert!(after.reset_password_token.is_none());
        assert!(after.reset_password_expires.is_none());

        // Old password invalidated, new one works
        assert!(matches!(
            manager.authenticate("alice", "Secret123!").await,
            Err(ServiceError::Authentication(_))
        ));
        manager.authenticate("alice", "NewPass1!").await.unwrap();

        // Token is single-use
        assert!(matches!(
            manager.confirm_password_reset(&token, "Another1!").await,
            Err(ServiceError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let (manager, _dir) = create_test_manager().await;

        let account = manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();
        manager.request_password_reset("a@x.com").await.unwrap();

        let token = manager
            .get_account(&account.id)
            .await
            .unwrap()
            .reset_password_token
            .unwrap();

        // Age the token past its window
        sqlx::query("UPDATE account SET reset_password_expires = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::minutes(1))
            .bind(&account.id)
            .execute(&manager.db)
            .await
            .unwrap();

        assert!(matches!(
            manager.validate_reset_token(&token).await,
            Err(ServiceError::Authentication(_))
        ));
        // Exact string match is not enough once expired
        assert!(matches!(
            manager.confirm_password_reset(&token, "NewPass1!").await,
            Err(ServiceError::Authentication(_))
        ));

        // Password unchanged
        manager.authenticate("alice", "Secret123!").await.unwrap();
    }

    #[tokio::test]
    async fn request_reset_for_unknown_email_is_not_found() {
        let (manager, _dir) = create_test_manager().await;

        match manager.request_password_reset("nobody@x.com").await {
            Err(ServiceError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reset_token_sweep_clears_only_expired_rows() {
        let (manager, _dir) = create_test_manager().await;

        let expired = manager
            .register(register_request("alice", "a@x.com"))
            .await
            .unwrap();
        let pending = manager
            .register(register_request("bob", "b@x.com"))
            .await
            .unwrap();

        manager.request_password_reset("a@x.com").await.unwrap();
        manager.request_password_reset("b@x.com").await.unwrap();

        sqlx::query("UPDATE account SET reset_password_expires = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::minutes(5))
            .bind(&expired.id)
            .execute(&manager.db)
            .await
            .unwrap();

        let swept = manager.clear_expired_reset_tokens().await.unwrap();
        assert_eq!(swept, 1);

        let alice = manager.get_account(&expired.id).await.unwrap();
        assert!(alice.reset_password_token.is_none());
        assert!(alice.reset_password_expires.is_none());

        let bob = manager.get_account(&pending.id).await.unwrap();
        assert!(bob.reset_password_token.is_some());
        assert!(bob.reset_password_expires.is_some());
    }
}
