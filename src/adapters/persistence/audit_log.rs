use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::audit::{AuditLogEntry, NewAuditEntry, ProviderAuditLogRepo},
};

fn row_to_entry(row: sqlx::postgres::PgRow) -> AuditLogEntry {
    AuditLogEntry {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        payer_id: row.get("payer_id"),
        provider: row.get("provider"),
        action: row.get("action"),
        status: row.get("status"),
        message: row.get("message"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ProviderAuditLogRepo for PostgresPersistence {
    async fn append(&self, entry: &NewAuditEntry) -> AppResult<AuditLogEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO provider_audit_log (id, tenant_id, payer_id, provider, action, status, message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, tenant_id, payer_id, provider, action, status, message, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.tenant_id)
        .bind(entry.payer_id)
        .bind(entry.provider)
        .bind(entry.action.as_ref())
        .bind(entry.status.as_ref())
        .bind(&entry.message)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_entry(row))
    }

    async fn list_recent(&self, tenant_id: Uuid, limit: i64) -> AppResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, payer_id, provider, action, status, message, created_at
            FROM provider_audit_log
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_entry).collect())
    }
}
