/// Configuration management for accountd
use crate::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Public base URL embedded in verification and reset links
    pub public_url: String,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub account_db: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens, loaded once at startup
    pub jwt_secret: String,
    /// Session token lifetime in seconds
    pub session_ttl_secs: i64,
    /// Password reset token lifetime in seconds
    pub reset_token_ttl_secs: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
    pub sender_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ServiceResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("ACCOUNTD_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("ACCOUNTD_PORT")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .map_err(|_| ServiceError::Validation("Invalid port number".to_string()))?;

        let public_url = env::var("ACCOUNTD_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let version = env::var("ACCOUNTD_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("ACCOUNTD_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let account_db = env::var("ACCOUNTD_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("accounts.sqlite"));

        let jwt_secret = env::var("ACCOUNTD_JWT_SECRET")
            .map_err(|_| ServiceError::Validation("JWT secret required".to_string()))?;
        let session_ttl_secs = env::var("ACCOUNTD_SESSION_TTL_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);
        let reset_token_ttl_secs = env::var("ACCOUNTD_RESET_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);

        let email = if let Ok(smtp_url) = env::var("ACCOUNTD_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("ACCOUNTD_MAIL_FROM")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
                sender_name: env::var("ACCOUNTD_MAIL_SENDER_NAME")
                    .unwrap_or_else(|_| "Accountd".to_string()),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                version,
            },
            storage: StorageConfig {
                data_directory,
                account_db,
            },
            auth: AuthConfig {
                jwt_secret,
                session_ttl_secs,
                reset_token_ttl_secs,
            },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ServiceResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ServiceError::Validation(
                "Hostname cannot be empty".to_string(),
            ));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(ServiceError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.auth.session_ttl_secs <= 0 || self.auth.reset_token_ttl_secs <= 0 {
            return Err(ServiceError::Validation(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
