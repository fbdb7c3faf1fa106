use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::entitlement::{FeatureTrialProfile, FeatureTrialRepo, NewFeatureTrial},
    domain::entities::trial_status::{ReminderThreshold, TrialStatus},
};

const TRIAL_COLUMNS: &str = "id, tenant_id, feature_id, started_at, expires_at, status, ended_at, \
                             started_by, reminder_7d_sent, reminder_3d_sent, reminder_1d_sent";

fn row_to_profile(row: &sqlx::postgres::PgRow) -> FeatureTrialProfile {
    FeatureTrialProfile {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        feature_id: row.get("feature_id"),
        started_at: row.get("started_at"),
        expires_at: row.get("expires_at"),
        status: row.get("status"),
        ended_at: row.get("ended_at"),
        started_by: row.get("started_by"),
        reminder_7d_sent: row.get("reminder_7d_sent"),
        reminder_3d_sent: row.get("reminder_3d_sent"),
        reminder_1d_sent: row.get("reminder_1d_sent"),
    }
}

fn reminder_column(threshold: ReminderThreshold) -> &'static str {
    match threshold {
        ReminderThreshold::SevenDays => "reminder_7d_sent",
        ReminderThreshold::ThreeDays => "reminder_3d_sent",
        ReminderThreshold::OneDay => "reminder_1d_sent",
    }
}

#[async_trait]
impl FeatureTrialRepo for PostgresPersistence {
    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<FeatureTrialProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIAL_COLUMNS} FROM feature_trials WHERE tenant_id = $1 ORDER BY started_at DESC"
        ))
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn list_for_feature(
        &self,
        tenant_id: Uuid,
        feature_id: Uuid,
    ) -> AppResult<Vec<FeatureTrialProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRIAL_COLUMNS}
            FROM feature_trials
            WHERE tenant_id = $1 AND feature_id = $2
            ORDER BY started_at DESC
            "#
        ))
        .bind(tenant_id)
        .bind(feature_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn create(&self, trial: &NewFeatureTrial) -> AppResult<FeatureTrialProfile> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO feature_trials (id, tenant_id, feature_id, started_at, expires_at, status, started_by)
            VALUES ($1, $2, $3, $4, $5, 'active', $6)
            RETURNING {TRIAL_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(trial.tenant_id)
        .bind(trial.feature_id)
        .bind(trial.started_at)
        .bind(trial.expires_at)
        .bind(trial.started_by)
        .fetch_one(self.pool())
        .await;

        match result {
            Ok(row) => Ok(row_to_profile(&row)),
            // The partial unique index allows one active trial per tenant and feature.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::TrialUnavailable("A trial for this feature is already running".into()),
            ),
            Err(e) => Err(AppError::from(e)),
        }
    }

    async fn end(
        &self,
        trial_id: Uuid,
        status: TrialStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<FeatureTrialProfile>> {
        let updated = sqlx::query(&format!(
            r#"
            UPDATE feature_trials
            SET status = $2, ended_at = $3
            WHERE id = $1 AND status = 'active'
            RETURNING {TRIAL_COLUMNS}
            "#
        ))
        .bind(trial_id)
        .bind(status)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        if let Some(row) = updated {
            return Ok(Some(row_to_profile(&row)));
        }

        let existing = sqlx::query(&format!("SELECT {TRIAL_COLUMNS} FROM feature_trials WHERE id = $1"))
            .bind(trial_id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(existing.as_ref().map(row_to_profile))
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> AppResult<Vec<FeatureTrialProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE feature_trials
            SET status = 'expired', ended_at = $1
            WHERE status = 'active' AND expires_at <= $1
            RETURNING {TRIAL_COLUMNS}
            "#
        ))
        .bind(now)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn claim_reminders(
        &self,
        threshold: ReminderThreshold,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<FeatureTrialProfile>> {
        let column = reminder_column(threshold);
        let rows = sqlx::query(&format!(
            r#"
            UPDATE feature_trials
            SET {column} = TRUE
            WHERE status = 'active' AND {column} = FALSE
              AND expires_at > $1 AND expires_at <= $2
            RETURNING {TRIAL_COLUMNS}
            "#
        ))
        .bind(window_start)
        .bind(window_end)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }
}
