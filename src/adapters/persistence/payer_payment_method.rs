use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::gateway_settlement::{PayerPaymentMethodProfile, PayerPaymentMethodRepo},
    domain::entities::payment_method::PaymentMethodKind,
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> PayerPaymentMethodProfile {
    let method: String = row.get("method");
    PayerPaymentMethodProfile {
        tenant_id: row.get("tenant_id"),
        payer_id: row.get("payer_id"),
        method: PaymentMethodKind::parse_lenient(&method),
        iban: row.get("iban"),
        bic: row.get("bic"),
        account_holder: row.get("account_holder"),
        bank_name: row.get("bank_name"),
        mandate_reference: row.get("mandate_reference"),
        gateway_customer_id: row.get("gateway_customer_id"),
        gateway_instrument_ref: row.get("gateway_instrument_ref"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl PayerPaymentMethodRepo for PostgresPersistence {
    async fn get(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
    ) -> AppResult<Option<PayerPaymentMethodProfile>> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, payer_id, method, iban, bic, account_holder, bank_name,
                   mandate_reference, gateway_customer_id, gateway_instrument_ref, updated_at
            FROM payer_payment_methods
            WHERE tenant_id = $1 AND payer_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(payer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }
}
