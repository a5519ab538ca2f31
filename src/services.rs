//! Collaborators shared by handlers, detectors and dialogue flows

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::identity::log_tag;
use crate::messenger::{LogMessenger, Messenger, WebhookMessenger};
use crate::session::{InMemorySessionStore, PgSessionStore, SessionStore};
use crate::store::{FinanceStore, InMemoryFinanceStore};
use crate::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn FinanceStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub messenger: Arc<dyn Messenger>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(
        store: Arc<dyn FinanceStore>,
        sessions: Arc<dyn SessionStore>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sessions,
            messenger,
            clock,
        }
    }

    /// Production wiring: Postgres sessions when a database is configured,
    /// webhook delivery when an outbound URL is set.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let sessions: Arc<dyn SessionStore> = match &config.database_url {
            Some(url) => Arc::new(PgSessionStore::connect_lazy(url)?),
            None => {
                info!("Session context backend: in-memory");
                Arc::new(InMemorySessionStore::new())
            }
        };
        let messenger: Arc<dyn Messenger> = match &config.outbound_webhook_url {
            Some(url) => Arc::new(WebhookMessenger::new(url.clone())?),
            None => {
                warn!("OUTBOUND_WEBHOOK_URL not set; replies are only logged");
                Arc::new(LogMessenger)
            }
        };

        Ok(Self::new(
            Arc::new(InMemoryFinanceStore::new()),
            sessions,
            messenger,
            Arc::new(SystemClock::new(config.timezone)),
        ))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Send a reply. Delivery failures are logged and never retried.
    pub async fn reply(&self, to: &str, text: &str) {
        if let Err(e) = self.messenger.send(to, text).await {
            warn!(user = %log_tag(to), "Failed to deliver reply: {}", e);
        }
    }
}
