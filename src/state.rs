use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::services::{EventBuffer, Mailer, SmtpMailer, SupabaseAdmin, Telephony, TwilioClient};

/// Per-user budget for outbound message sends
pub type MessagingLimiter = DefaultKeyedRateLimiter<Uuid>;

/// Everything a handler needs, shared through axum `State`
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseManager,
    pub events: Arc<EventBuffer>,
    pub telephony: Arc<dyn Telephony>,
    pub mailer: Arc<dyn Mailer>,
    pub admin: SupabaseAdmin,
    pub messaging_limiter: Arc<MessagingLimiter>,
}

impl AppState {
    /// Wire the production clients from configuration
    pub fn new(config: AppConfig, db: DatabaseManager) -> Self {
        let telephony: Arc<dyn Telephony> = Arc::new(TwilioClient::new(
            config.twilio.clone(),
            config.server.public_app_url.as_deref(),
        ));
        let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::from_config(&config.smtp));
        Self::with_clients(config, db, telephony, mailer)
    }

    /// Same as `new` with caller-supplied messaging clients
    pub fn with_clients(
        config: AppConfig,
        db: DatabaseManager,
        telephony: Arc<dyn Telephony>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let per_minute = NonZeroU32::new(config.api.messaging_rate_limit_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            events: Arc::new(EventBuffer::from_config(&config.events)),
            admin: SupabaseAdmin::new(&config.supabase),
            messaging_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            config: Arc::new(config),
            db,
            telephony,
            mailer,
        }
    }

    pub fn pool(&self) -> &PgPool {
        self.db.pool()
    }

    /// Evict expired message events and forget senders whose budget has refilled
    pub async fn sweep(&self) -> usize {
        let removed = self.events.cleanup().await;
        self.messaging_limiter.retain_recent();
        self.messaging_limiter.shrink_to_fit();
        removed
    }

    /// Run `sweep` on a fixed interval until the task is aborted
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = state.sweep().await;
                if removed > 0 {
                    tracing::debug!("Evicted {} expired message events", removed);
                }
            }
        })
    }
}
