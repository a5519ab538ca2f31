//! Finance data persistence
//!
//! Users, transactions, categories, reminders and recurrences. The engine
//! only talks to the `FinanceStore` trait; `InMemoryFinanceStore` backs the
//! binaries and tests.

pub mod memory;

pub use memory::InMemoryFinanceStore;

use crate::models::{
    Category, NewRecurrence, NewReminder, NewTransaction, NewUser, Recurrence, Reminder,
    Transaction, TransactionFilter, TransactionKind, TransactionPatch, User,
};
use crate::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait FinanceStore: Send + Sync {
    // Users
    async fn find_user(&self, identifier: &str) -> Result<Option<User>>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn list_users(&self) -> Result<Vec<User>>;

    // Transactions
    async fn create_transaction(&self, tx: NewTransaction) -> Result<Transaction>;
    /// Full id or the short prefix shown in listings.
    async fn find_transaction(&self, user_id: Uuid, reference: &str)
        -> Result<Option<Transaction>>;
    async fn update_transaction(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>>;
    async fn delete_transaction(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
    /// Newest first.
    async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>>;
    async fn sum_by_kind(
        &self,
        user_id: Uuid,
        kind: TransactionKind,
        filter: &TransactionFilter,
    ) -> Result<Decimal>;

    // Categories
    async fn find_category_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Category>>;
    async fn create_category(
        &self,
        user_id: Uuid,
        name: &str,
        kind: TransactionKind,
    ) -> Result<Category>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>>;
    async fn list_categories(&self, user_id: Uuid) -> Result<Vec<Category>>;

    // Reminders
    async fn create_reminder(&self, reminder: NewReminder) -> Result<Reminder>;
    /// Unsent reminders, soonest first.
    async fn list_pending_reminders(&self, user_id: Uuid) -> Result<Vec<Reminder>>;
    /// Unsent reminders with a target date on or before `today`.
    async fn list_due_reminders(&self, today: NaiveDate) -> Result<Vec<Reminder>>;
    async fn mark_reminder_sent(&self, id: Uuid) -> Result<()>;

    // Recurrences
    async fn create_recurrence(&self, recurrence: NewRecurrence) -> Result<Recurrence>;
    async fn list_recurrences(&self, user_id: Uuid) -> Result<Vec<Recurrence>>;
}

/// Category id for a transaction: the named category (created on first use)
/// or the kind's fallback category.
pub async fn resolve_category(
    store: &dyn FinanceStore,
    user_id: Uuid,
    name: Option<&str>,
    kind: TransactionKind,
) -> Result<Uuid> {
    let name = name
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| kind.default_category().to_string());

    if let Some(existing) = store.find_category_by_name(user_id, &name).await? {
        return Ok(existing.id);
    }

    Ok(store.create_category(user_id, &name, kind).await?.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_category_reuses_and_falls_back() {
        let store = InMemoryFinanceStore::new();
        let user = Uuid::new_v4();

        let fallback = resolve_category(&store, user, None, TransactionKind::Expense)
            .await
            .unwrap();
        let again = resolve_category(&store, user, Some("  "), TransactionKind::Expense)
            .await
            .unwrap();
        assert_eq!(fallback, again);
        let category = store.get_category(fallback).await.unwrap().unwrap();
        assert_eq!(category.name, "Outras despesas");

        let food = resolve_category(&store, user, Some("Mercado"), TransactionKind::Expense)
            .await
            .unwrap();
        let food_again = resolve_category(&store, user, Some("mercado"), TransactionKind::Expense)
            .await
            .unwrap();
        assert_eq!(food, food_again);
        assert_eq!(store.list_categories(user).await.unwrap().len(), 2);
    }
}
