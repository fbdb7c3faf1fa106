use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::entitlement::{FeatureAddonProfile, FeatureAddonRepo, NewFeatureAddon},
};

const ADDON_COLUMNS: &str = "id, tenant_id, feature_id, started_at, expires_at, monthly_price_cents, status";

fn row_to_profile(row: &sqlx::postgres::PgRow) -> FeatureAddonProfile {
    FeatureAddonProfile {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        feature_id: row.get("feature_id"),
        started_at: row.get("started_at"),
        expires_at: row.get("expires_at"),
        monthly_price_cents: row.get("monthly_price_cents"),
        status: row.get("status"),
    }
}

#[async_trait]
impl FeatureAddonRepo for PostgresPersistence {
    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<FeatureAddonProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ADDON_COLUMNS}
            FROM feature_addons
            WHERE tenant_id = $1
            ORDER BY started_at DESC
            "#
        ))
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn create(&self, addon: &NewFeatureAddon) -> AppResult<FeatureAddonProfile> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO feature_addons (id, tenant_id, feature_id, started_at, expires_at, monthly_price_cents, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'active')
            RETURNING {ADDON_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(addon.tenant_id)
        .bind(addon.feature_id)
        .bind(addon.started_at)
        .bind(addon.expires_at)
        .bind(addon.monthly_price_cents)
        .fetch_one(self.pool())
        .await;

        match result {
            Ok(row) => Ok(row_to_profile(&row)),
            // One active add-on per tenant and feature.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::AddonUnavailable("This feature is already active as an add-on".into()),
            ),
            Err(e) => Err(AppError::from(e)),
        }
    }

    async fn cancel(&self, addon_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<FeatureAddonProfile>> {
        let updated = sqlx::query(&format!(
            r#"
            UPDATE feature_addons
            SET status = 'cancelled', expires_at = LEAST(COALESCE(expires_at, $2), $2)
            WHERE id = $1 AND status = 'active'
            RETURNING {ADDON_COLUMNS}
            "#
        ))
        .bind(addon_id)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        if let Some(row) = updated {
            return Ok(Some(row_to_profile(&row)));
        }

        let existing = sqlx::query(&format!("SELECT {ADDON_COLUMNS} FROM feature_addons WHERE id = $1"))
            .bind(addon_id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(existing.as_ref().map(row_to_profile))
    }
}
