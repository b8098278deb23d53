use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_reset_token_sweep_job(Arc::clone(&self)));
    }

    /// Clear expired password reset tokens (runs every 5 minutes)
    ///
    /// Keeps the account rows honest: reset fields only exist while a reset
    /// is pending and unexpired. Consumption already clears them; this sweep
    /// handles the tokens nobody ever used.
    async fn expired_reset_token_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            match scheduler.context.accounts.clear_expired_reset_tokens().await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleared {} expired password reset tokens", count);
                    }
                }
                Err(e) => error!("Failed to clear expired reset tokens: {}", e),
            }
        }
    }
}
