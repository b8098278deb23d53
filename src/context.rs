/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::ServiceResult,
    mailer::Mailer,
    token::TokenIssuer,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub tokens: Arc<TokenIssuer>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ServiceResult<Self> {
        // Validate configuration
        config.validate()?;

        // Initialize account database
        let db = db::create_pool(&config.storage.account_db, db::DatabaseOptions::default())
            .await?;

        // Run migrations
        db::run_migrations(&db).await?;

        // Test connection
        db::test_connection(&db).await?;

        let config = Arc::new(config);

        // Signing key loaded once; every component receives its configuration
        // at construction time
        let tokens = Arc::new(TokenIssuer::new(&config.auth));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        let accounts = Arc::new(AccountManager::new(
            db.clone(),
            Arc::clone(&config),
            Arc::clone(&tokens),
            Arc::clone(&mailer),
        ));

        Ok(Self {
            config,
            db,
            accounts,
            tokens,
            mailer,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        self.config.service.public_url.clone()
    }
}
