//! Postgres-backed session store
//!
//! Contexts live in a single `session_contexts` table keyed by the user's
//! channel address. The payload is stored as JSON text.

use super::{Payload, SessionContext, SessionStore, Stage};
use crate::error::EngineError;
use crate::Result;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub struct PgSessionStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgSessionStore {
    /// Lazily connecting store; nothing touches the database until the first
    /// operation.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                EngineError::DatabaseError(format!("Failed to configure session pool: {}", e))
            })?;

        info!("Session context backend: postgres");

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS session_contexts (
                      user_identifier TEXT PRIMARY KEY,
                      stage TEXT,
                      payload TEXT NOT NULL DEFAULT '{}',
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                EngineError::SessionError(format!(
                    "Failed to initialize session context schema: {}",
                    e
                ))
            })?;

        Ok(())
    }

    fn decode_payload(raw: &str) -> Payload {
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
            Ok(map) => Payload::from_map(map),
            Err(error) => {
                warn!("Discarding unreadable session payload: {}", error);
                Payload::new()
            }
        }
    }

    fn decode_stage(raw: Option<String>) -> Option<Stage> {
        let raw = raw?;
        match raw.parse::<Stage>() {
            Ok(stage) => Some(stage),
            Err(error) => {
                warn!("Discarding unknown session stage: {}", error);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, user: &str) -> Result<Option<SessionContext>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT stage, payload, updated_at
            FROM session_contexts
            WHERE user_identifier = $1
            "#,
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::SessionError(format!("Failed to load session context: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.try_get("payload").unwrap_or_else(|_| "{}".to_string());

        Ok(Some(SessionContext {
            user_identifier: user.to_string(),
            stage: Self::decode_stage(row.try_get::<Option<String>, _>("stage").ok().flatten()),
            payload: Self::decode_payload(&payload),
            updated_at: row.try_get("updated_at").unwrap_or_else(|_| Utc::now()),
        }))
    }

    async fn set(&self, user: &str, stage: Option<Stage>, payload: Payload) -> Result<()> {
        self.ensure_schema().await?;

        let payload = serde_json::to_string(&payload)?;

        sqlx::query(
            r#"
            INSERT INTO session_contexts (user_identifier, stage, payload, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_identifier)
            DO UPDATE SET stage = EXCLUDED.stage, payload = EXCLUDED.payload, updated_at = NOW()
            "#,
        )
        .bind(user)
        .bind(stage.map(|s| s.as_str()))
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::SessionError(format!("Failed to save session context: {}", e)))?;

        Ok(())
    }

    async fn merge_payload(&self, user: &str, partial: Payload) -> Result<()> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            EngineError::SessionError(format!(
                "Failed to begin transaction for payload merge: {}",
                e
            ))
        })?;

        let existing = sqlx::query(
            "SELECT payload FROM session_contexts WHERE user_identifier = $1 FOR UPDATE",
        )
        .bind(user)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| EngineError::SessionError(format!("Failed to read payload: {}", e)))?;

        let mut payload = existing
            .and_then(|row| row.try_get::<String, _>("payload").ok())
            .map(|raw| Self::decode_payload(&raw))
            .unwrap_or_default();
        payload.merge(partial);
        let payload = serde_json::to_string(&payload)?;

        sqlx::query(
            r#"
            INSERT INTO session_contexts (user_identifier, stage, payload, updated_at)
            VALUES ($1, NULL, $2, NOW())
            ON CONFLICT (user_identifier)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()
            "#,
        )
        .bind(user)
        .bind(payload)
        .execute(&mut *tx)
        .await
        .map_err(|e| EngineError::SessionError(format!("Failed to merge payload: {}", e)))?;

        tx.commit().await.map_err(|e| {
            EngineError::SessionError(format!("Failed to commit payload merge: {}", e))
        })?;

        Ok(())
    }

    async fn set_stage(&self, user: &str, stage: Option<Stage>) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO session_contexts (user_identifier, stage, payload, updated_at)
            VALUES ($1, $2, '{}', NOW())
            ON CONFLICT (user_identifier)
            DO UPDATE SET stage = EXCLUDED.stage, updated_at = NOW()
            "#,
        )
        .bind(user)
        .bind(stage.map(|s| s.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::SessionError(format!("Failed to set stage: {}", e)))?;

        Ok(())
    }

    async fn clear(&self, user: &str) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query("DELETE FROM session_contexts WHERE user_identifier = $1")
            .bind(user)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                EngineError::SessionError(format!("Failed to clear session context: {}", e))
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tolerates_garbage() {
        assert!(PgSessionStore::decode_payload("not json").is_empty());
        assert_eq!(
            PgSessionStore::decode_stage(Some("reminder.awaiting_date".into())),
            Some(Stage::ReminderAwaitingDate)
        );
        assert_eq!(PgSessionStore::decode_stage(Some("legacy_stage".into())), None);
        assert_eq!(PgSessionStore::decode_stage(None), None);
    }

    #[test]
    fn test_decode_payload_keeps_values() {
        let payload = PgSessionStore::decode_payload(r#"{"message":"pagar","day":5}"#);
        assert_eq!(payload.get_str("message"), Some("pagar"));
        assert_eq!(payload.get_u32("day"), Some(5));
    }
}
