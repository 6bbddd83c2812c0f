//! Postgres-backed session and history ledgers (`sessions`, `auth_history`).

use super::{HistoryLedger, HistoryRecord, SessionLedger, SessionRecord};
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, Span, info_span};
use uuid::Uuid;

pub(crate) fn db_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Both ledgers share one pool.
#[derive(Clone, Debug)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &PgRow) -> AuthResult<SessionRecord> {
    let kind: String = row.try_get("kind")?;
    Ok(SessionRecord {
        session_id: row.try_get("session_id")?,
        principal_id: row.try_get("principal_id")?,
        kind: kind.parse().map_err(AuthError::LedgerUnavailable)?,
        valid: row.try_get("valid")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<HistoryRecord, sqlx::Error> {
    Ok(HistoryRecord {
        session_id: row.try_get("session_id")?,
        principal_id: row.try_get("principal_id")?,
        device: row.try_get("device")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        valid: row.try_get("valid")?,
        created_at: row.try_get("created_at")?,
        last_used_at: row.try_get("last_used_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[async_trait]
impl SessionLedger for PgLedger {
    async fn put(&self, record: SessionRecord) -> AuthResult<()> {
        let query = r"
            INSERT INTO sessions (session_id, principal_id, kind, valid, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        sqlx::query(query)
            .bind(&record.session_id)
            .bind(record.principal_id)
            .bind(record.kind.as_str())
            .bind(record.valid)
            .bind(record.created_at)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
        let query = r"
            SELECT session_id, principal_id, kind, valid, created_at, expires_at
            FROM sessions
            WHERE session_id = $1
        ";
        let row = sqlx::query(query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn invalidate(&self, session_id: &str) -> AuthResult<bool> {
        let query = "UPDATE sessions SET valid = FALSE WHERE session_id = $1";
        let result = sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn invalidate_all(&self, principal_id: Uuid) -> AuthResult<u64> {
        let query = "UPDATE sessions SET valid = FALSE WHERE principal_id = $1";
        let result = sqlx::query(query)
            .bind(principal_id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, session_id: &str) -> AuthResult<()> {
        let query = "DELETE FROM sessions WHERE session_id = $1";
        sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(())
    }

    async fn delete_by_principal(&self, principal_id: Uuid) -> AuthResult<u64> {
        let query = "DELETE FROM sessions WHERE principal_id = $1";
        let result = sqlx::query(query)
            .bind(principal_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let query = "DELETE FROM sessions WHERE expires_at < $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HistoryLedger for PgLedger {
    async fn append(&self, record: HistoryRecord) -> AuthResult<()> {
        let query = r"
            INSERT INTO auth_history
                (session_id, principal_id, device, latitude, longitude, valid,
                 created_at, last_used_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        sqlx::query(query)
            .bind(&record.session_id)
            .bind(record.principal_id)
            .bind(&record.device)
            .bind(record.latitude)
            .bind(record.longitude)
            .bind(record.valid)
            .bind(record.created_at)
            .bind(record.last_used_at)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;
        Ok(())
    }

    async fn list_by_principal(&self, principal_id: Uuid) -> AuthResult<Vec<HistoryRecord>> {
        let query = r"
            SELECT session_id, principal_id, device, latitude, longitude, valid,
                   created_at, last_used_at, expires_at
            FROM auth_history
            WHERE principal_id = $1
            ORDER BY created_at, id
        ";
        let rows = sqlx::query(query)
            .bind(principal_id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        Ok(rows
            .iter()
            .map(history_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> AuthResult<()> {
        let query = "UPDATE auth_history SET last_used_at = $2 WHERE session_id = $1";
        sqlx::query(query)
            .bind(session_id)
            .bind(at)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(())
    }

    async fn invalidate(&self, session_id: &str) -> AuthResult<()> {
        let query = "UPDATE auth_history SET valid = FALSE WHERE session_id = $1";
        sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(())
    }

    async fn invalidate_all(&self, principal_id: Uuid) -> AuthResult<()> {
        let query = "UPDATE auth_history SET valid = FALSE WHERE principal_id = $1";
        sqlx::query(query)
            .bind(principal_id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> AuthResult<()> {
        let query = "DELETE FROM auth_history WHERE session_id = $1";
        sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(())
    }

    async fn delete_by_principal(&self, principal_id: Uuid) -> AuthResult<u64> {
        let query = "DELETE FROM auth_history WHERE principal_id = $1";
        let result = sqlx::query(query)
            .bind(principal_id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let query = "DELETE FROM auth_history WHERE expires_at < $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }
}
