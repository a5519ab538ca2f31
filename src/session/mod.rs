//! Session context persistence
//!
//! A session context is the (stage, payload) pair that says which question
//! the user is currently answering. There is at most one per user; its
//! absence means the next message is a free-form command.

pub mod lock;
pub mod postgres;

pub use lock::UserLocks;
pub use postgres::PgSessionStore;

use crate::error::EngineError;
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

//
// ================= Stage =================
//

/// Pending question of a multi-turn flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "registration.awaiting_name")]
    RegistrationAwaitingName,
    #[serde(rename = "registration.awaiting_tax_id")]
    RegistrationAwaitingTaxId,
    #[serde(rename = "category.awaiting_name")]
    CategoryAwaitingName,
    #[serde(rename = "category.awaiting_type")]
    CategoryAwaitingType,
    #[serde(rename = "scheduling.awaiting_date")]
    SchedulingAwaitingDate,
    #[serde(rename = "reminder.awaiting_text")]
    ReminderAwaitingText,
    #[serde(rename = "reminder.awaiting_date")]
    ReminderAwaitingDate,
    #[serde(rename = "reminder.awaiting_value")]
    ReminderAwaitingValue,
    #[serde(rename = "reminder.awaiting_month")]
    ReminderAwaitingMonth,
    #[serde(rename = "edit.awaiting_id")]
    EditAwaitingId,
    #[serde(rename = "edit.awaiting_field")]
    EditAwaitingField,
    #[serde(rename = "edit.awaiting_value")]
    EditAwaitingValue,
    #[serde(rename = "delete.awaiting_id")]
    DeleteAwaitingId,
    #[serde(rename = "delete.awaiting_confirmation")]
    DeleteAwaitingConfirmation,
    #[serde(rename = "recurrence.awaiting_confirmation")]
    RecurrenceAwaitingConfirmation,
    #[serde(rename = "recurrence.awaiting_value")]
    RecurrenceAwaitingValue,
}

const ALL_STAGES: &[Stage] = &[
    Stage::RegistrationAwaitingName,
    Stage::RegistrationAwaitingTaxId,
    Stage::CategoryAwaitingName,
    Stage::CategoryAwaitingType,
    Stage::SchedulingAwaitingDate,
    Stage::ReminderAwaitingText,
    Stage::ReminderAwaitingDate,
    Stage::ReminderAwaitingValue,
    Stage::ReminderAwaitingMonth,
    Stage::EditAwaitingId,
    Stage::EditAwaitingField,
    Stage::EditAwaitingValue,
    Stage::DeleteAwaitingId,
    Stage::DeleteAwaitingConfirmation,
    Stage::RecurrenceAwaitingConfirmation,
    Stage::RecurrenceAwaitingValue,
];

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RegistrationAwaitingName => "registration.awaiting_name",
            Stage::RegistrationAwaitingTaxId => "registration.awaiting_tax_id",
            Stage::CategoryAwaitingName => "category.awaiting_name",
            Stage::CategoryAwaitingType => "category.awaiting_type",
            Stage::SchedulingAwaitingDate => "scheduling.awaiting_date",
            Stage::ReminderAwaitingText => "reminder.awaiting_text",
            Stage::ReminderAwaitingDate => "reminder.awaiting_date",
            Stage::ReminderAwaitingValue => "reminder.awaiting_value",
            Stage::ReminderAwaitingMonth => "reminder.awaiting_month",
            Stage::EditAwaitingId => "edit.awaiting_id",
            Stage::EditAwaitingField => "edit.awaiting_field",
            Stage::EditAwaitingValue => "edit.awaiting_value",
            Stage::DeleteAwaitingId => "delete.awaiting_id",
            Stage::DeleteAwaitingConfirmation => "delete.awaiting_confirmation",
            Stage::RecurrenceAwaitingConfirmation => "recurrence.awaiting_confirmation",
            Stage::RecurrenceAwaitingValue => "recurrence.awaiting_value",
        }
    }

    /// Flow name, the part before the dot.
    pub fn flow(&self) -> &'static str {
        self.as_str().split('.').next().unwrap_or_default()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stage {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ALL_STAGES
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| EngineError::InvalidState(format!("Unknown stage: {}", s)))
    }
}

//
// ================= Payload =================
//

/// Partial data collected by a flow. Amounts are stored as decimal strings
/// and dates as ISO strings so the payload survives a JSON round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    /// Shallow merge; keys in `other` win.
    pub fn merge(&mut self, other: Payload) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn with_decimal(self, key: &str, value: Decimal) -> Self {
        self.with(key, value.to_string())
    }

    pub fn with_date(self, key: &str, value: NaiveDate) -> Self {
        self.with(key, value.format("%Y-%m-%d").to_string())
    }

    /// Insert only when `value` is present.
    pub fn with_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn get_decimal(&self, key: &str) -> Option<Decimal> {
        match self.0.get(key)? {
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        }
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key)?.as_bool()
    }

    pub fn get_date(&self, key: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.get_str(key)?, "%Y-%m-%d").ok()
    }
}

//
// ================= Context =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_identifier: String,
    pub stage: Option<Stage>,
    pub payload: Payload,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(user_identifier: &str) -> Self {
        Self {
            user_identifier: user_identifier.to_string(),
            stage: None,
            payload: Payload::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Persistence for session contexts. Every operation is safe on a missing
/// record: writes create it, `clear` is a no-op.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user: &str) -> Result<Option<SessionContext>>;
    /// Full overwrite of stage and payload.
    async fn set(&self, user: &str, stage: Option<Stage>, payload: Payload) -> Result<()>;
    /// Shallow merge into the existing payload.
    async fn merge_payload(&self, user: &str, partial: Payload) -> Result<()>;
    async fn set_stage(&self, user: &str, stage: Option<Stage>) -> Result<()>;
    async fn clear(&self, user: &str) -> Result<()>;
}

/// In-memory session store for development and tests
pub struct InMemorySessionStore {
    contexts: Arc<RwLock<HashMap<String, SessionContext>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user: &str) -> Result<Option<SessionContext>> {
        let contexts = self.contexts.read().await;
        Ok(contexts.get(user).cloned())
    }

    async fn set(&self, user: &str, stage: Option<Stage>, payload: Payload) -> Result<()> {
        let mut contexts = self.contexts.write().await;
        contexts.insert(
            user.to_string(),
            SessionContext {
                user_identifier: user.to_string(),
                stage,
                payload,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn merge_payload(&self, user: &str, partial: Payload) -> Result<()> {
        let mut contexts = self.contexts.write().await;
        let context = contexts
            .entry(user.to_string())
            .or_insert_with(|| SessionContext::new(user));
        context.payload.merge(partial);
        context.updated_at = Utc::now();
        Ok(())
    }

    async fn set_stage(&self, user: &str, stage: Option<Stage>) -> Result<()> {
        let mut contexts = self.contexts.write().await;
        let context = contexts
            .entry(user.to_string())
            .or_insert_with(|| SessionContext::new(user));
        context.stage = stage;
        context.updated_at = Utc::now();
        Ok(())
    }

    async fn clear(&self, user: &str) -> Result<()> {
        let mut contexts = self.contexts.write().await;
        contexts.remove(user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "5511999990000@c.us";

    #[test]
    fn test_stage_names_round_trip() {
        for stage in ALL_STAGES {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), *stage);
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, Value::String(stage.as_str().to_string()));
        }
        assert!("reminder.unknown".parse::<Stage>().is_err());
        assert_eq!(Stage::ReminderAwaitingMonth.flow(), "reminder");
    }

    #[test]
    fn test_payload_typed_accessors() {
        let payload = Payload::new()
            .with("message", "pagar a conta")
            .with_decimal("amount", Decimal::new(15050, 2))
            .with("day", 10)
            .with_date("date", NaiveDate::from_ymd_opt(2026, 5, 1).unwrap())
            .with("blank", "  ");

        assert_eq!(payload.get_str("message"), Some("pagar a conta"));
        assert_eq!(payload.get_decimal("amount"), Some(Decimal::new(15050, 2)));
        assert_eq!(payload.get_u32("day"), Some(10));
        assert_eq!(payload.get_date("date"), NaiveDate::from_ymd_opt(2026, 5, 1));
        assert_eq!(payload.get_str("blank"), None);
        assert_eq!(payload.get_str("missing"), None);
    }

    #[tokio::test]
    async fn test_operations_on_missing_record() {
        let store = InMemorySessionStore::new();

        store.clear(USER).await.unwrap();
        assert!(store.get(USER).await.unwrap().is_none());

        store
            .merge_payload(USER, Payload::new().with("message", "x"))
            .await
            .unwrap();
        let ctx = store.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, None);
        assert_eq!(ctx.payload.get_str("message"), Some("x"));
    }

    #[tokio::test]
    async fn test_merge_is_shallow_and_set_overwrites() {
        let store = InMemorySessionStore::new();
        store
            .set(
                USER,
                Some(Stage::ReminderAwaitingDate),
                Payload::new().with("message", "a").with("amount", "10"),
            )
            .await
            .unwrap();

        store
            .merge_payload(USER, Payload::new().with("amount", "20"))
            .await
            .unwrap();
        let ctx = store.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.payload.get_str("message"), Some("a"));
        assert_eq!(ctx.payload.get_str("amount"), Some("20"));
        assert_eq!(ctx.stage, Some(Stage::ReminderAwaitingDate));

        store.set(USER, Some(Stage::ReminderAwaitingText), Payload::new()).await.unwrap();
        let ctx = store.get(USER).await.unwrap().unwrap();
        assert!(ctx.payload.is_empty());

        store.set_stage(USER, Some(Stage::ReminderAwaitingMonth)).await.unwrap();
        let ctx = store.get(USER).await.unwrap().unwrap();
        assert_eq!(ctx.stage, Some(Stage::ReminderAwaitingMonth));

        store.clear(USER).await.unwrap();
        assert!(store.get(USER).await.unwrap().is_none());
    }
}
