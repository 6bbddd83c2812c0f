//! Postgres principal store (`principals` table).

use super::{Allowances, Principal, PrincipalStore};
use crate::{
    error::{AuthError, AuthResult, is_unique_violation},
    ledger::postgres::db_span,
};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

const PRINCIPAL_COLUMNS: &str = "id, name, email, blocked, admin, allow_view, allow_create, \
     allow_manage_permissions, allow_delete, allow_block, allow_send_reset_email, privilege_id";

#[derive(Clone, Debug)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn principal_from_row(row: &PgRow) -> Result<Principal, sqlx::Error> {
    Ok(Principal {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        blocked: row.try_get("blocked")?,
        admin: row.try_get("admin")?,
        allowances: Allowances {
            view: row.try_get("allow_view")?,
            create: row.try_get("allow_create")?,
            manage_permissions: row.try_get("allow_manage_permissions")?,
            delete: row.try_get("allow_delete")?,
            block: row.try_get("allow_block")?,
            send_reset_email: row.try_get("allow_send_reset_email")?,
        },
        privilege_id: row.try_get("privilege_id")?,
    })
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn get(&self, id: Uuid) -> AuthResult<Option<Principal>> {
        let query = format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", "SELECT principal by id"))
            .await?;
        Ok(row.as_ref().map(principal_from_row).transpose()?)
    }

    async fn get_by_email(&self, email: &str) -> AuthResult<Option<Principal>> {
        let query =
            format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE LOWER(email) = LOWER($1)");
        let row = sqlx::query(&query)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", "SELECT principal by email"))
            .await?;
        Ok(row.as_ref().map(principal_from_row).transpose()?)
    }

    async fn list(&self) -> AuthResult<Vec<Principal>> {
        let query =
            format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE admin = FALSE ORDER BY email");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", "SELECT principals"))
            .await?;
        Ok(rows
            .iter()
            .map(principal_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn password_hash(&self, id: Uuid) -> AuthResult<Option<String>> {
        let query = "SELECT password_hash FROM principals WHERE id = $1";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        Ok(row
            .map(|row| row.try_get::<String, _>("password_hash"))
            .transpose()?)
    }

    async fn create(&self, principal: &Principal, password_hash: &str) -> AuthResult<()> {
        let query = r"
            INSERT INTO principals
                (id, name, email, password_hash, blocked, admin, allow_view, allow_create,
                 allow_manage_permissions, allow_delete, allow_block, allow_send_reset_email,
                 privilege_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ";
        let allowances = principal.allowances;
        let result = sqlx::query(query)
            .bind(principal.id)
            .bind(&principal.name)
            .bind(principal.email.trim())
            .bind(password_hash)
            .bind(principal.blocked)
            .bind(principal.admin)
            .bind(allowances.view)
            .bind(allowances.create)
            .bind(allowances.manage_permissions)
            .bind(allowances.delete)
            .bind(allowances.block)
            .bind(allowances.send_reset_email)
            .bind(principal.privilege_id.as_deref())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(AuthError::invalid_input("principal already exists"))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_allowances(&self, id: Uuid, allowances: Allowances) -> AuthResult<bool> {
        let query = r"
            UPDATE principals
            SET allow_view = $2,
                allow_create = $3,
                allow_manage_permissions = $4,
                allow_delete = $5,
                allow_block = $6,
                allow_send_reset_email = $7,
                updated_at = NOW()
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(allowances.view)
            .bind(allowances.create)
            .bind(allowances.manage_permissions)
            .bind(allowances.delete)
            .bind(allowances.block)
            .bind(allowances.send_reset_email)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_blocked(&self, id: Uuid, blocked: bool) -> AuthResult<bool> {
        let query = "UPDATE principals SET blocked = $2, updated_at = NOW() WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(blocked)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<bool> {
        let query = "UPDATE principals SET password_hash = $2, updated_at = NOW() WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> AuthResult<bool> {
        let query = "DELETE FROM principals WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
