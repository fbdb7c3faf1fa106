use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::{
        gateway_settlement::PaymentIntentProfile,
        ledger_export::{LedgerExportJob, LedgerExportProfile, LedgerExportRepo},
    },
};

pub(crate) const LEDGER_COLUMNS: &str = "id, tenant_id, payment_intent_id, status, response_payload, \
                                         error_message, attempt_count, next_attempt_at, locked_at, \
                                         processed_at, created_at";

pub(crate) fn row_to_profile(row: &sqlx::postgres::PgRow) -> LedgerExportProfile {
    LedgerExportProfile {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        payment_intent_id: row.get("payment_intent_id"),
        status: row.get("status"),
        response_payload: row.get("response_payload"),
        error_message: row.get("error_message"),
        attempt_count: row.get("attempt_count"),
        next_attempt_at: row.get("next_attempt_at"),
        locked_at: row.get("locked_at"),
        processed_at: row.get("processed_at"),
        created_at: row.get("created_at"),
    }
}

/// Intent columns of the claim query are prefixed with `pi_`.
fn row_to_intent(row: &sqlx::postgres::PgRow) -> PaymentIntentProfile {
    PaymentIntentProfile {
        id: row.get("pi_id"),
        tenant_id: row.get("pi_tenant_id"),
        payer_id: row.get("pi_payer_id"),
        external_id: row.get("pi_external_id"),
        amount_cents: row.get("pi_amount_cents"),
        currency: row.get("pi_currency"),
        status: row.get("pi_status"),
        description: row.get("pi_description"),
        metadata: row.get("pi_metadata"),
        failure_message: row.get("pi_failure_message"),
        created_at: row.get("pi_created_at"),
        updated_at: row.get("pi_updated_at"),
    }
}

#[async_trait]
impl LedgerExportRepo for PostgresPersistence {
    async fn claim_due(
        &self,
        limit: i64,
        max_attempts: i32,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> AppResult<Vec<LedgerExportJob>> {
        // SKIP LOCKED lets concurrent sweeps split the backlog instead of double-exporting.
        let rows = sqlx::query(
            r#"
            WITH due AS (
                SELECT id
                FROM ledger_exports
                WHERE status IN ('pending', 'failed')
                  AND attempt_count < $2
                  AND (next_attempt_at IS NULL OR next_attempt_at <= $3)
                  AND (locked_at IS NULL OR locked_at < $4)
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            ),
            claimed AS (
                UPDATE ledger_exports le
                SET locked_at = $3
                FROM due
                WHERE le.id = due.id
                RETURNING le.id, le.tenant_id, le.payment_intent_id, le.status, le.response_payload,
                          le.error_message, le.attempt_count, le.next_attempt_at, le.locked_at,
                          le.processed_at, le.created_at
            )
            SELECT c.*,
                   pi.id AS pi_id, pi.tenant_id AS pi_tenant_id, pi.payer_id AS pi_payer_id,
                   pi.external_id AS pi_external_id, pi.amount_cents AS pi_amount_cents,
                   pi.currency AS pi_currency, pi.status AS pi_status,
                   pi.description AS pi_description, pi.metadata AS pi_metadata,
                   pi.failure_message AS pi_failure_message, pi.created_at AS pi_created_at,
                   pi.updated_at AS pi_updated_at
            FROM claimed c
            JOIN payment_intents pi ON pi.id = c.payment_intent_id
            ORDER BY c.created_at
            "#,
        )
        .bind(limit)
        .bind(max_attempts)
        .bind(now)
        .bind(stale_before)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .iter()
            .map(|row| LedgerExportJob {
                entry: row_to_profile(row),
                intent: row_to_intent(row),
            })
            .collect())
    }

    async fn mark_success(&self, id: Uuid, response: &JsonValue, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ledger_exports
            SET status = 'success', response_payload = $2, error_message = NULL,
                processed_at = $3, next_attempt_at = NULL, locked_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(response)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempt_count: i32,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE ledger_exports
            SET status = 'failed', attempt_count = $2, error_message = $3,
                next_attempt_at = $4, locked_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempt_count)
        .bind(error)
        .bind(next_attempt_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}
