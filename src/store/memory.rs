//! In-memory finance store for development and tests

use super::FinanceStore;
use crate::identity::stable_user_id;
use crate::models::{
    Category, NewRecurrence, NewReminder, NewTransaction, NewUser, Recurrence, Reminder,
    Transaction, TransactionFilter, TransactionKind, TransactionPatch, User,
};
use crate::text::normalize_for_match;
use crate::Result;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryFinanceStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
    categories: Arc<RwLock<HashMap<Uuid, Category>>>,
    reminders: Arc<RwLock<HashMap<Uuid, Reminder>>>,
    recurrences: Arc<RwLock<HashMap<Uuid, Recurrence>>>,
}

impl InMemoryFinanceStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            transactions: Arc::new(RwLock::new(HashMap::new())),
            categories: Arc::new(RwLock::new(HashMap::new())),
            reminders: Arc::new(RwLock::new(HashMap::new())),
            recurrences: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryFinanceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(tx: &Transaction, filter: &TransactionFilter) -> bool {
    filter.kind.map_or(true, |k| tx.kind == k)
        && filter.status.map_or(true, |s| tx.status == s)
        && filter.category_id.map_or(true, |c| tx.category_id == Some(c))
        && filter.from.map_or(true, |from| tx.occurred_on >= from)
        && filter.to.map_or(true, |to| tx.occurred_on <= to)
}

#[async_trait::async_trait]
impl FinanceStore for InMemoryFinanceStore {
    async fn find_user(&self, identifier: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(identifier).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let record = User {
            id: stable_user_id(&user.identifier),
            identifier: user.identifier.clone(),
            name: user.name,
            tax_id: user.tax_id,
            created_at: Utc::now(),
        };

        let mut users = self.users.write().await;
        users.insert(user.identifier, record.clone());
        Ok(record)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|u| u.created_at);
        Ok(all)
    }

    async fn create_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let record = Transaction {
            id: Uuid::new_v4(),
            user_id: tx.user_id,
            kind: tx.kind,
            amount: tx.amount,
            status: tx.status(),
            description: tx.description,
            category_id: tx.category_id,
            occurred_on: tx.occurred_on,
            scheduled_for: tx.scheduled_for,
            recurring: tx.recurring,
            created_at: Utc::now(),
        };

        let mut transactions = self.transactions.write().await;
        transactions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_transaction(
        &self,
        user_id: Uuid,
        reference: &str,
    ) -> Result<Option<Transaction>> {
        let reference = reference.trim().to_lowercase().replace('-', "");
        if reference.is_empty() {
            return Ok(None);
        }

        let transactions = self.transactions.read().await;
        let mut matches = transactions
            .values()
            .filter(|tx| tx.user_id == user_id)
            .filter(|tx| tx.id.simple().to_string().starts_with(&reference));

        // An ambiguous prefix resolves to nothing.
        match (matches.next(), matches.next()) {
            (Some(tx), None) => Ok(Some(tx.clone())),
            _ => Ok(None),
        }
    }

    async fn update_transaction(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>> {
        let mut transactions = self.transactions.write().await;
        let Some(tx) = transactions.get_mut(&id).filter(|tx| tx.user_id == user_id) else {
            return Ok(None);
        };

        if let Some(amount) = patch.amount {
            tx.amount = amount;
        }
        if let Some(description) = patch.description {
            tx.description = Some(description);
        }
        if let Some(date) = patch.occurred_on {
            tx.occurred_on = date;
        }

        Ok(Some(tx.clone()))
    }

    async fn delete_transaction(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut transactions = self.transactions.write().await;
        if transactions.get(&id).is_some_and(|tx| tx.user_id == user_id) {
            transactions.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut found: Vec<Transaction> = transactions
            .values()
            .filter(|tx| tx.user_id == user_id && matches_filter(tx, filter))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.occurred_on
                .cmp(&a.occurred_on)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(found)
    }

    async fn sum_by_kind(
        &self,
        user_id: Uuid,
        kind: TransactionKind,
        filter: &TransactionFilter,
    ) -> Result<Decimal> {
        let filter = TransactionFilter {
            kind: Some(kind),
            ..filter.clone()
        };
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .filter(|tx| tx.user_id == user_id && matches_filter(tx, &filter))
            .map(|tx| tx.amount)
            .sum())
    }

    async fn find_category_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Category>> {
        let wanted = normalize_for_match(name);
        let categories = self.categories.read().await;
        Ok(categories
            .values()
            .find(|c| c.user_id == user_id && normalize_for_match(&c.name) == wanted)
            .cloned())
    }

    async fn create_category(
        &self,
        user_id: Uuid,
        name: &str,
        kind: TransactionKind,
    ) -> Result<Category> {
        let category = Category {
            id: Uuid::new_v4(),
            user_id,
            name: name.trim().to_string(),
            kind,
            created_at: Utc::now(),
        };

        let mut categories = self.categories.write().await;
        categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        let categories = self.categories.read().await;
        Ok(categories.get(&id).cloned())
    }

    async fn list_categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let categories = self.categories.read().await;
        let mut found: Vec<Category> = categories
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn create_reminder(&self, reminder: NewReminder) -> Result<Reminder> {
        let record = Reminder {
            id: Uuid::new_v4(),
            user_id: reminder.user_id,
            message: reminder.message,
            target_date: reminder.target_date,
            amount: reminder.amount,
            sent: false,
            created_at: Utc::now(),
        };

        let mut reminders = self.reminders.write().await;
        reminders.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_pending_reminders(&self, user_id: Uuid) -> Result<Vec<Reminder>> {
        let reminders = self.reminders.read().await;
        let mut found: Vec<Reminder> = reminders
            .values()
            .filter(|r| r.user_id == user_id && !r.sent)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.target_date);
        Ok(found)
    }

    async fn list_due_reminders(&self, today: NaiveDate) -> Result<Vec<Reminder>> {
        let reminders = self.reminders.read().await;
        let mut found: Vec<Reminder> = reminders
            .values()
            .filter(|r| !r.sent && r.target_date <= today)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.target_date);
        Ok(found)
    }

    async fn mark_reminder_sent(&self, id: Uuid) -> Result<()> {
        let mut reminders = self.reminders.write().await;
        if let Some(reminder) = reminders.get_mut(&id) {
            reminder.sent = true;
        }
        Ok(())
    }

    async fn create_recurrence(&self, recurrence: NewRecurrence) -> Result<Recurrence> {
        let record = Recurrence {
            id: Uuid::new_v4(),
            user_id: recurrence.user_id,
            transaction_id: recurrence.transaction_id,
            description: recurrence.description,
            amount: recurrence.amount,
            kind: recurrence.kind,
            frequency: recurrence.frequency,
            monthly_rule: recurrence.monthly_rule,
            next_charge: recurrence.next_charge,
            interval: 1,
            created_at: Utc::now(),
        };

        let mut recurrences = self.recurrences.write().await;
        recurrences.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_recurrences(&self, user_id: Uuid) -> Result<Vec<Recurrence>> {
        let recurrences = self.recurrences.read().await;
        let mut found: Vec<Recurrence> = recurrences
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.next_charge);
        Ok(found)
    }
}
