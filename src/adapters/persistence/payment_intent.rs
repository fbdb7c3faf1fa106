use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::gateway_settlement::{
        NewPaymentIntent, PaymentIntentProfile, PaymentIntentRepo,
    },
};

pub(crate) const INTENT_COLUMNS: &str = "id, tenant_id, payer_id, external_id, amount_cents, \
                                         currency, status, description, metadata, failure_message, \
                                         created_at, updated_at";

pub(crate) fn row_to_profile(row: &sqlx::postgres::PgRow) -> PaymentIntentProfile {
    PaymentIntentProfile {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        payer_id: row.get("payer_id"),
        external_id: row.get("external_id"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        status: row.get("status"),
        description: row.get("description"),
        metadata: row.get("metadata"),
        failure_message: row.get("failure_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl PaymentIntentRepo for PostgresPersistence {
    async fn create(&self, intent: &NewPaymentIntent) -> AppResult<PaymentIntentProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_intents
                (id, tenant_id, payer_id, external_id, amount_cents, currency, status, description, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, 'requires_action', $7, $8)
            RETURNING {INTENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(intent.tenant_id)
        .bind(intent.payer_id)
        .bind(&intent.external_id)
        .bind(intent.amount_cents)
        .bind(&intent.currency)
        .bind(&intent.description)
        .bind(&intent.metadata)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn get_by_external_id(
        &self,
        tenant_id: Uuid,
        external_id: &str,
    ) -> AppResult<Option<PaymentIntentProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE tenant_id = $1 AND external_id = $2"
        ))
        .bind(tenant_id)
        .bind(external_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }
}
