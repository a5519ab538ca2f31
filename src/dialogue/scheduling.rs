//! Scheduled transaction waiting for its date.

use super::{restart, Turn};
use crate::handlers::{register_transaction, Registration};
use crate::llm::TransactionDraft;
use crate::models::{TransactionKind, User};
use crate::services::Services;
use crate::session::{Payload, Stage};
use crate::temporal::parse_date;
use crate::text::format_date;
use crate::Result;
use rust_decimal::Decimal;

const ASK_DATE: &str = "📅 Para quando devo agendar?\nExemplo: *25/02*, *amanhã*, *dia 10*";

/// Park a transaction until the user tells when it happens.
pub async fn start(
    services: &Services,
    identifier: &str,
    kind: TransactionKind,
    amount: Decimal,
    draft: &TransactionDraft,
) -> Result<()> {
    let payload = Payload::new()
        .with("kind", kind.as_str())
        .with_decimal("amount", amount)
        .with_opt("description", draft.description.clone())
        .with_opt("category", draft.category.clone());

    services
        .sessions
        .set(identifier, Some(Stage::SchedulingAwaitingDate), payload)
        .await?;
    services.reply(identifier, ASK_DATE).await;
    Ok(())
}

pub async fn on_date(services: &Services, turn: &Turn<'_>, user: &User, payload: &Payload) -> Result<()> {
    let kind = payload.get_str("kind").and_then(TransactionKind::parse);
    let (Some(kind), Some(amount)) = (kind, payload.get_decimal("amount")) else {
        return restart(services, turn.identifier, Stage::SchedulingAwaitingDate).await;
    };

    let today = services.today();
    let Some(date) = parse_date(turn.text, today) else {
        services
            .reply(turn.identifier, "❌ Data inválida. Use por exemplo *25/02/2026*.")
            .await;
        return Ok(());
    };
    if date < today {
        let text = format!(
            "⚠️ Essa data (*{}*) já passou.\n📅 Me diga uma data a partir de hoje.",
            format_date(date)
        );
        services.reply(turn.identifier, &text).await;
        return Ok(());
    }

    let draft = TransactionDraft {
        amount: Some(amount),
        description: payload.get_str("description").map(str::to_string),
        category: payload.get_str("category").map(str::to_string),
        schedule: Some(true),
        scheduled_date: Some(format_date(date)),
    };

    // A failed write leaves the flow parked so the date can be sent again.
    match register_transaction(services, turn.identifier, user, kind, &draft, turn.text).await? {
        Registration::Recorded(_) | Registration::InvalidAmount => {
            services.sessions.clear(turn.identifier).await
        }
        Registration::NeedsDate { .. } => {
            // the date was already resolved above
            restart(services, turn.identifier, Stage::SchedulingAwaitingDate).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::error::EngineError;
    use crate::models::{
        Category, NewRecurrence, NewReminder, NewTransaction, NewUser, Recurrence, Reminder,
        Transaction, TransactionFilter, TransactionPatch, TransactionStatus,
    };
    use crate::store::{FinanceStore, InMemoryFinanceStore};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use uuid::Uuid;

    /// Reads go to memory; transaction writes fail.
    struct ReadOnlyStore(Arc<InMemoryFinanceStore>);

    #[async_trait::async_trait]
    impl FinanceStore for ReadOnlyStore {
        async fn find_user(&self, identifier: &str) -> Result<Option<User>> {
            self.0.find_user(identifier).await
        }
        async fn create_user(&self, user: NewUser) -> Result<User> {
            self.0.create_user(user).await
        }
        async fn list_users(&self) -> Result<Vec<User>> {
            self.0.list_users().await
        }
        async fn create_transaction(&self, _tx: NewTransaction) -> Result<Transaction> {
            Err(EngineError::DatabaseError("connection reset".into()))
        }
        async fn find_transaction(&self, user_id: Uuid, reference: &str) -> Result<Option<Transaction>> {
            self.0.find_transaction(user_id, reference).await
        }
        async fn update_transaction(
            &self,
            user_id: Uuid,
            id: Uuid,
            patch: TransactionPatch,
        ) -> Result<Option<Transaction>> {
            self.0.update_transaction(user_id, id, patch).await
        }
        async fn delete_transaction(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
            self.0.delete_transaction(user_id, id).await
        }
        async fn list_transactions(&self, user_id: Uuid, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
            self.0.list_transactions(user_id, filter).await
        }
        async fn sum_by_kind(
            &self,
            user_id: Uuid,
            kind: TransactionKind,
            filter: &TransactionFilter,
        ) -> Result<Decimal> {
            self.0.sum_by_kind(user_id, kind, filter).await
        }
        async fn find_category_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Category>> {
            self.0.find_category_by_name(user_id, name).await
        }
        async fn create_category(&self, user_id: Uuid, name: &str, kind: TransactionKind) -> Result<Category> {
            self.0.create_category(user_id, name, kind).await
        }
        async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
            self.0.get_category(id).await
        }
        async fn list_categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
            self.0.list_categories(user_id).await
        }
        async fn create_reminder(&self, reminder: NewReminder) -> Result<Reminder> {
            self.0.create_reminder(reminder).await
        }
        async fn list_pending_reminders(&self, user_id: Uuid) -> Result<Vec<Reminder>> {
            self.0.list_pending_reminders(user_id).await
        }
        async fn list_due_reminders(&self, today: NaiveDate) -> Result<Vec<Reminder>> {
            self.0.list_due_reminders(today).await
        }
        async fn mark_reminder_sent(&self, id: Uuid) -> Result<()> {
            self.0.mark_reminder_sent(id).await
        }
        async fn create_recurrence(&self, recurrence: NewRecurrence) -> Result<Recurrence> {
            self.0.create_recurrence(recurrence).await
        }
        async fn list_recurrences(&self, user_id: Uuid) -> Result<Vec<Recurrence>> {
            self.0.list_recurrences(user_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_write_keeps_the_date_question_open() {
        let mut h = Harness::on(d(2026, 3, 10));
        h.services.store = Arc::new(ReadOnlyStore(h.store.clone()));

        let draft = TransactionDraft {
            description: Some("IPTU".into()),
            ..Default::default()
        };
        start(&h.services, USER, TransactionKind::Expense, Decimal::from(900), &draft)
            .await
            .unwrap();
        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();

        let turn = Turn::new(USER, Some(&h.user), "20/03");
        let result = on_date(&h.services, &turn, &h.user, &ctx.payload).await;
        assert!(matches!(result, Err(EngineError::DatabaseError(_))));

        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::SchedulingAwaitingDate));
        assert_eq!(ctx.payload.get_decimal("amount"), Some(Decimal::from(900)));
        assert!(h
            .store
            .list_transactions(h.user.id, &TransactionFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_date_answer_creates_pending_transaction() {
        let h = Harness::on(d(2026, 3, 10));
        let draft = TransactionDraft {
            description: Some("IPTU".into()),
            ..Default::default()
        };
        start(&h.services, USER, TransactionKind::Expense, Decimal::from(900), &draft)
            .await
            .unwrap();
        let ctx = h.services.sessions.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::SchedulingAwaitingDate));

        let turn = Turn::new(USER, Some(&h.user), "ontem não, 01/01/2020");
        on_date(&h.services, &turn, &h.user, &ctx.payload).await.unwrap();
        assert!(h.last_reply().await.contains("já passou"));
        assert!(h.services.sessions.get(USER).await.unwrap().is_some());

        let turn = Turn::new(USER, Some(&h.user), "20/03");
        on_date(&h.services, &turn, &h.user, &ctx.payload).await.unwrap();

        assert!(h.services.sessions.get(USER).await.unwrap().is_none());
        let txs = h
            .store
            .list_transactions(h.user.id, &TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].status, TransactionStatus::Pending);
        assert_eq!(txs[0].scheduled_for, Some(d(2026, 3, 20)));
        assert_eq!(txs[0].description.as_deref(), Some("IPTU"));
    }
}
