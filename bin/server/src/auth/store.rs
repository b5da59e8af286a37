//! Session store engines.
//!
//! Session records are kept server side, keyed by the provider session id;
//! the cookie holds only the key. Two engines exist: a process-local map for
//! development and tests, and a PostgreSQL table for deployments where
//! sessions must survive restarts and be shared across instances.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use epr_frontend_defra_id::{SessionId, UserSession};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Session store errors.
#[derive(Debug)]
pub enum StoreError {
    /// The backing store failed.
    Backend(String),
    /// A stored record could not be serialized or deserialized.
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "Session store error: {msg}"),
            Self::Serialization(msg) => write!(f, "Session record error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Keyed, TTL-bound storage for session records.
///
/// `get` filters out expired records without deleting them, so reads stay
/// side-effect free; deletion belongs to `purge_expired`. `put` replaces the
/// whole record under its key, which makes concurrent refreshes resolve to
/// whichever write lands last.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Looks up a live session record.
    async fn get(&self, id: &SessionId) -> Result<Option<UserSession>, StoreError>;

    /// Writes a session record under its session id, resetting its TTL.
    async fn put(&self, session: &UserSession) -> Result<(), StoreError>;

    /// Deletes a session record. Deleting an absent record is not an error.
    async fn remove(&self, id: &SessionId) -> Result<(), StoreError>;

    /// Deletes expired records, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

struct StoredEntry {
    session: UserSession,
    expires_at: DateTime<Utc>,
}

/// Process-local session store.
pub struct MemorySessionStore {
    ttl: Duration,
    entries: RwLock<HashMap<SessionId, StoredEntry>>,
}

impl MemorySessionStore {
    /// Creates an empty store whose records live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<UserSession>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(id)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.session.clone()))
    }

    async fn put(&self, session: &UserSession) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            session.session_id.clone(),
            StoredEntry {
                session: session.clone(),
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

/// PostgreSQL-backed session store.
pub struct PostgresSessionStore {
    pool: PgPool,
    ttl: Duration,
}

impl PostgresSessionStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    record: serde_json::Value,
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<UserSession>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT record
            FROM user_sessions
            WHERE id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            Some(row) => {
                let session = serde_json::from_value(row.record)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, session: &UserSession) -> Result<(), StoreError> {
        let record = serde_json::to_value(session)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let expires_at = Utc::now() + self.ttl;

        sqlx::query(
            r#"
            INSERT INTO user_sessions (id, record, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id)
            DO UPDATE SET record = EXCLUDED.record, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(session.session_id.as_str())
        .bind(record)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_sessions WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
