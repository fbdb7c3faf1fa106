use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::entitlement::{FeatureProfile, PlanCatalogRepo, PlanProfile},
};

const FEATURE_COLUMNS: &str = "id, key, name, description, trial_eligible, trial_days, \
                               addon_available, addon_monthly_price_cents";

fn row_to_plan(row: &sqlx::postgres::PgRow) -> PlanProfile {
    PlanProfile {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        monthly_price_cents: row.get("monthly_price_cents"),
    }
}

fn row_to_feature(row: &sqlx::postgres::PgRow) -> FeatureProfile {
    FeatureProfile {
        id: row.get("id"),
        key: row.get("key"),
        name: row.get("name"),
        description: row.get("description"),
        trial_eligible: row.get("trial_eligible"),
        trial_days: row.get("trial_days"),
        addon_available: row.get("addon_available"),
        addon_monthly_price_cents: row.get("addon_monthly_price_cents"),
    }
}

#[async_trait]
impl PlanCatalogRepo for PostgresPersistence {
    async fn get_tenant_plan(&self, tenant_id: Uuid) -> AppResult<Option<PlanProfile>> {
        let row = sqlx::query(
            r#"
            SELECT p.id, p.code, p.name, p.monthly_price_cents
            FROM tenant_plans tp
            JOIN plans p ON p.id = tp.plan_id
            WHERE tp.tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_plan))
    }

    async fn get_feature_by_key(&self, key: &str) -> AppResult<Option<FeatureProfile>> {
        let row = sqlx::query(&format!("SELECT {FEATURE_COLUMNS} FROM features WHERE key = $1"))
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_feature))
    }

    async fn list_features(&self) -> AppResult<Vec<FeatureProfile>> {
        let rows = sqlx::query(&format!("SELECT {FEATURE_COLUMNS} FROM features ORDER BY key"))
            .fetch_all(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_feature).collect())
    }

    async fn list_plan_feature_ids(&self, plan_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query("SELECT feature_id FROM plan_features WHERE plan_id = $1")
            .bind(plan_id)
            .fetch_all(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(rows.iter().map(|row| row.get("feature_id")).collect())
    }

    async fn list_plans_including(&self, feature_id: Uuid) -> AppResult<Vec<PlanProfile>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.code, p.name, p.monthly_price_cents
            FROM plans p
            JOIN plan_features pf ON pf.plan_id = p.id
            WHERE pf.feature_id = $1
            ORDER BY p.monthly_price_cents, p.code
            "#,
        )
        .bind(feature_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_plan).collect())
    }
}
