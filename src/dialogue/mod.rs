//! Multi-turn dialogue flows
//!
//! While a stage is active the next message is the answer to its question
//! and goes straight to that stage's handler, skipping detection and
//! inference. A handler ends in one of three ways:
//!
//! - completes the flow and clears the context
//! - advances to another stage with a payload that is enough to re-enter it
//! - re-prompts, leaving stage and payload untouched
//!
//! A payload that lacks what its stage needs clears the context and asks
//! the user to start over.

pub mod category;
pub mod delete;
pub mod edit;
pub mod recurrence;
pub mod registration;
pub mod reminder;
pub mod scheduling;

use crate::identity::log_tag;
use crate::models::User;
use crate::services::Services;
use crate::session::{Payload, Stage};
use crate::Result;
use tracing::{debug, warn};

pub const RESTART_REPLY: &str =
    "⚠️ Me perdi no meio da conversa.\nVamos recomeçar: me diga de novo o que você precisa 🙂";

/// One answer to a pending question.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub identifier: &'a str,
    /// Registered user, absent only during registration.
    pub user: Option<&'a User>,
    pub text: &'a str,
}

impl<'a> Turn<'a> {
    pub fn new(identifier: &'a str, user: Option<&'a User>, text: &'a str) -> Self {
        Self {
            identifier,
            user,
            text,
        }
    }
}

/// Clear the context after an unusable payload and ask the user to restart.
pub async fn restart(services: &Services, identifier: &str, stage: Stage) -> Result<()> {
    warn!(
        user = %log_tag(identifier),
        stage = stage.as_str(),
        "Stage payload incomplete, restarting flow"
    );
    services.sessions.clear(identifier).await?;
    services.reply(identifier, RESTART_REPLY).await;
    Ok(())
}

/// Hand the message to the handler of the active stage.
pub async fn resume(services: &Services, turn: &Turn<'_>, stage: Stage, payload: &Payload) -> Result<()> {
    debug!(user = %log_tag(turn.identifier), stage = stage.as_str(), "Resuming flow");

    match stage {
        Stage::RegistrationAwaitingName => return registration::on_name(services, turn).await,
        Stage::RegistrationAwaitingTaxId => {
            return registration::on_tax_id(services, turn, payload).await
        }
        _ => {}
    }

    let Some(user) = turn.user else {
        return restart(services, turn.identifier, stage).await;
    };

    match stage {
        Stage::CategoryAwaitingName => category::on_name(services, turn, user).await,
        Stage::CategoryAwaitingType => category::on_type(services, turn, user, payload).await,
        Stage::SchedulingAwaitingDate => scheduling::on_date(services, turn, user, payload).await,
        Stage::ReminderAwaitingText => reminder::on_text(services, turn, user, payload).await,
        Stage::ReminderAwaitingDate => reminder::on_date(services, turn, user, payload).await,
        Stage::ReminderAwaitingValue => reminder::on_value(services, turn, user, payload).await,
        Stage::ReminderAwaitingMonth => reminder::on_month(services, turn, user, payload).await,
        Stage::EditAwaitingId => edit::on_id(services, turn, user).await,
        Stage::EditAwaitingField => edit::on_field(services, turn, user, payload).await,
        Stage::EditAwaitingValue => edit::on_value(services, turn, user, payload).await,
        Stage::DeleteAwaitingId => delete::on_id(services, turn, user).await,
        Stage::DeleteAwaitingConfirmation => {
            delete::on_confirmation(services, turn, user, payload).await
        }
        Stage::RecurrenceAwaitingConfirmation => {
            recurrence::on_confirmation(services, turn, user, payload).await
        }
        Stage::RecurrenceAwaitingValue => recurrence::on_value(services, turn, user, payload).await,
        Stage::RegistrationAwaitingName | Stage::RegistrationAwaitingTaxId => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::clock::FixedClock;
    use crate::identity::stable_user_id;
    use crate::messenger::RecordingMessenger;
    use crate::models::User;
    use crate::services::Services;
    use crate::session::InMemorySessionStore;
    use crate::store::InMemoryFinanceStore;
    use chrono::{NaiveDate, Utc};
    use std::sync::Arc;

    pub const USER: &str = "5511977776666@c.us";

    pub struct Harness {
        pub services: Services,
        pub messenger: Arc<RecordingMessenger>,
        pub store: Arc<InMemoryFinanceStore>,
        pub user: User,
    }

    impl Harness {
        pub fn on(today: NaiveDate) -> Self {
            let store = Arc::new(InMemoryFinanceStore::new());
            let messenger = Arc::new(RecordingMessenger::new());
            let services = Services::new(
                store.clone(),
                Arc::new(InMemorySessionStore::new()),
                messenger.clone(),
                Arc::new(FixedClock::on(today)),
            );
            let user = User {
                id: stable_user_id(USER),
                identifier: USER.to_string(),
                name: "João Pereira".to_string(),
                tax_id: "52998224725".to_string(),
                created_at: Utc::now(),
            };
            Self {
                services,
                messenger,
                store,
                user,
            }
        }

        pub async fn last_reply(&self) -> String {
            self.messenger.last_to(USER).await.unwrap_or_default()
        }
    }

    pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_missing_payload_restarts() {
        let h = Harness::on(d(2026, 3, 10));
        h.services
            .sessions
            .set(USER, Some(Stage::DeleteAwaitingConfirmation), Payload::new())
            .await
            .unwrap();

        let turn = Turn::new(USER, Some(&h.user), "sim");
        resume(&h.services, &turn, Stage::DeleteAwaitingConfirmation, &Payload::new())
            .await
            .unwrap();

        assert!(h.services.sessions.get(USER).await.unwrap().is_none());
        assert_eq!(h.last_reply().await, RESTART_REPLY);
    }

    #[tokio::test]
    async fn test_flow_without_user_restarts() {
        let h = Harness::on(d(2026, 3, 10));
        let turn = Turn::new(USER, None, "mercado");
        resume(&h.services, &turn, Stage::CategoryAwaitingName, &Payload::new())
            .await
            .unwrap();
        assert_eq!(h.last_reply().await, RESTART_REPLY);
    }
}
