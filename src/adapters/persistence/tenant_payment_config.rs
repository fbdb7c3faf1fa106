use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::provider_registry::{
        TenantPaymentConfigProfile, TenantPaymentConfigRepo, UpsertPaymentConfig,
    },
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> TenantPaymentConfigProfile {
    TenantPaymentConfigProfile {
        tenant_id: row.get("tenant_id"),
        provider: row.get("provider"),
        creditor_id: row.get("creditor_id"),
        gateway_secret_key_encrypted: row.get("gateway_secret_key_encrypted"),
        gateway_publishable_key: row.get("gateway_publishable_key"),
        gateway_webhook_secret_encrypted: row.get("gateway_webhook_secret_encrypted"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl TenantPaymentConfigRepo for PostgresPersistence {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<TenantPaymentConfigProfile>> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, provider, creditor_id, gateway_secret_key_encrypted,
                   gateway_publishable_key, gateway_webhook_secret_encrypted, created_at, updated_at
            FROM tenant_payment_configs
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn upsert(&self, config: &UpsertPaymentConfig) -> AppResult<TenantPaymentConfigProfile> {
        let row = sqlx::query(
            r#"
            INSERT INTO tenant_payment_configs
                (tenant_id, provider, creditor_id, gateway_secret_key_encrypted,
                 gateway_publishable_key, gateway_webhook_secret_encrypted)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id) DO UPDATE SET
                provider = EXCLUDED.provider,
                creditor_id = EXCLUDED.creditor_id,
                gateway_secret_key_encrypted = EXCLUDED.gateway_secret_key_encrypted,
                gateway_publishable_key = EXCLUDED.gateway_publishable_key,
                gateway_webhook_secret_encrypted = EXCLUDED.gateway_webhook_secret_encrypted,
                updated_at = NOW()
            RETURNING tenant_id, provider, creditor_id, gateway_secret_key_encrypted,
                      gateway_publishable_key, gateway_webhook_secret_encrypted, created_at, updated_at
            "#,
        )
        .bind(config.tenant_id)
        .bind(config.provider)
        .bind(&config.creditor_id)
        .bind(&config.gateway_secret_key_encrypted)
        .bind(&config.gateway_publishable_key)
        .bind(&config.gateway_webhook_secret_encrypted)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }
}
