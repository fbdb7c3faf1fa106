use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        access::AccessType,
        addon_status::AddonStatus,
        trial_status::{ReminderThreshold, TrialEndReason, TrialStatus},
    },
};

pub const DEFAULT_TRIAL_DAYS: i64 = 14;
const SECONDS_PER_DAY: i64 = 86_400;

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PlanProfile {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub monthly_price_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureProfile {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub trial_eligible: bool,
    pub trial_days: Option<i32>,
    pub addon_available: bool,
    pub addon_monthly_price_cents: Option<i64>,
}

impl FeatureProfile {
    pub fn trial_duration(&self) -> Duration {
        let days = self
            .trial_days
            .map(i64::from)
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_TRIAL_DAYS);
        Duration::days(days)
    }

    pub fn addon_price(&self) -> Option<i64> {
        if self.addon_available {
            self.addon_monthly_price_cents
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureTrialProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub feature_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: TrialStatus,
    pub ended_at: Option<DateTime<Utc>>,
    pub started_by: Option<Uuid>,
    pub reminder_7d_sent: bool,
    pub reminder_3d_sent: bool,
    pub reminder_1d_sent: bool,
}

impl FeatureTrialProfile {
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.status == TrialStatus::Active && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewFeatureTrial {
    pub tenant_id: Uuid,
    pub feature_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub started_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureAddonProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub feature_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// `None` for add-ons that run until cancelled.
    pub expires_at: Option<DateTime<Utc>>,
    pub monthly_price_cents: i64,
    pub status: AddonStatus,
}

#[derive(Debug, Clone)]
pub struct NewFeatureAddon {
    pub tenant_id: Uuid,
    pub feature_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub monthly_price_cents: i64,
}

impl FeatureAddonProfile {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == AddonStatus::Active && self.expires_at.is_none_or(|e| e > now)
    }
}

#[async_trait]
pub trait PlanCatalogRepo: Send + Sync {
    async fn get_tenant_plan(&self, tenant_id: Uuid) -> AppResult<Option<PlanProfile>>;
    async fn get_feature_by_key(&self, key: &str) -> AppResult<Option<FeatureProfile>>;
    async fn list_features(&self) -> AppResult<Vec<FeatureProfile>>;
    async fn list_plan_feature_ids(&self, plan_id: Uuid) -> AppResult<Vec<Uuid>>;
    /// Plans that include the feature, cheapest first.
    async fn list_plans_including(&self, feature_id: Uuid) -> AppResult<Vec<PlanProfile>>;
}

#[async_trait]
pub trait FeatureTrialRepo: Send + Sync {
    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<FeatureTrialProfile>>;

    async fn list_for_feature(
        &self,
        tenant_id: Uuid,
        feature_id: Uuid,
    ) -> AppResult<Vec<FeatureTrialProfile>>;

    /// Fails with `TrialUnavailable` when another trial for the pair is already active.
    async fn create(&self, trial: &NewFeatureTrial) -> AppResult<FeatureTrialProfile>;

    /// Move an active trial to `status`. Returns the row as stored afterwards, unchanged
    /// when it had already ended, or `None` when it does not exist.
    async fn end(
        &self,
        trial_id: Uuid,
        status: TrialStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<FeatureTrialProfile>>;

    async fn expire_due(&self, now: DateTime<Utc>) -> AppResult<Vec<FeatureTrialProfile>>;

    /// Atomically set the threshold's flag on active trials expiring in
    /// `(window_start, window_end]` whose flag is unset, returning them.
    async fn claim_reminders(
        &self,
        threshold: ReminderThreshold,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<FeatureTrialProfile>>;
}

#[async_trait]
pub trait FeatureAddonRepo: Send + Sync {
    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<FeatureAddonProfile>>;

    /// Fails with `AddonUnavailable` when the tenant already holds an active add-on
    /// for the feature.
    async fn create(&self, addon: &NewFeatureAddon) -> AppResult<FeatureAddonProfile>;

    /// Cancel an active add-on, closing `expires_at` at `now` unless it already lapsed.
    /// Returns the stored row, unchanged when already cancelled, or `None` when missing.
    async fn cancel(&self, addon_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<FeatureAddonProfile>>;
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub access_type: Option<AccessType>,
    pub days_remaining: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub code: String,
    pub name: String,
    pub monthly_price_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeHint {
    pub cheapest_plan: Option<PlanSummary>,
    pub addon_monthly_price_cents: Option<i64>,
    pub trial_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureAccess {
    pub feature_key: String,
    pub has_access: bool,
    pub access_type: Option<AccessType>,
    pub days_remaining: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub upgrade: Option<UpgradeHint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureEntitlement {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub has_access: bool,
    pub access_type: Option<AccessType>,
    pub days_remaining: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub trial_eligible: bool,
    pub trial_used: bool,
    pub can_start_trial: bool,
    pub addon_offered: bool,
    pub addon_monthly_price_cents: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrialReminderBatch {
    pub seven_day: Vec<FeatureTrialProfile>,
    pub three_day: Vec<FeatureTrialProfile>,
    pub one_day: Vec<FeatureTrialProfile>,
}

// ============================================================================
// Use Cases
// ============================================================================

pub struct EntitlementUseCases {
    catalog: Arc<dyn PlanCatalogRepo>,
    trials: Arc<dyn FeatureTrialRepo>,
    addons: Arc<dyn FeatureAddonRepo>,
}

impl EntitlementUseCases {
    pub fn new(
        catalog: Arc<dyn PlanCatalogRepo>,
        trials: Arc<dyn FeatureTrialRepo>,
        addons: Arc<dyn FeatureAddonRepo>,
    ) -> Self {
        Self {
            catalog,
            trials,
            addons,
        }
    }

    async fn plan_feature_ids(&self, tenant_id: Uuid) -> AppResult<HashSet<Uuid>> {
        match self.catalog.get_tenant_plan(tenant_id).await? {
            Some(plan) => Ok(self
                .catalog
                .list_plan_feature_ids(plan.id)
                .await?
                .into_iter()
                .collect()),
            None => Ok(HashSet::new()),
        }
    }

    pub async fn has_access(&self, tenant_id: Uuid, feature_key: &str) -> AppResult<FeatureAccess> {
        let feature = self
            .catalog
            .get_feature_by_key(feature_key)
            .await?
            .ok_or(AppError::NotFound)?;

        let now = Utc::now();
        let in_plan = self.plan_feature_ids(tenant_id).await?.contains(&feature.id);
        let trials = self.trials.list_for_feature(tenant_id, feature.id).await?;
        let addons = self.addons.list_by_tenant(tenant_id).await?;

        let resolution = resolve_access(feature.id, in_plan, &trials, &addons, now);

        let upgrade = if resolution.access_type.is_none() {
            let cheapest_plan = self
                .catalog
                .list_plans_including(feature.id)
                .await?
                .into_iter()
                .min_by_key(|p| p.monthly_price_cents)
                .map(|p| PlanSummary {
                    code: p.code,
                    name: p.name,
                    monthly_price_cents: p.monthly_price_cents,
                });
            Some(UpgradeHint {
                cheapest_plan,
                addon_monthly_price_cents: feature.addon_price(),
                trial_available: feature.trial_eligible && trials.is_empty(),
            })
        } else {
            None
        };

        Ok(FeatureAccess {
            feature_key: feature.key,
            has_access: resolution.access_type.is_some(),
            access_type: resolution.access_type,
            days_remaining: resolution.days_remaining,
            expires_at: resolution.expires_at,
            upgrade,
        })
    }

    pub async fn list_all_features(&self, tenant_id: Uuid) -> AppResult<Vec<FeatureEntitlement>> {
        let now = Utc::now();
        let features = self.catalog.list_features().await?;
        let plan_features = self.plan_feature_ids(tenant_id).await?;
        let trials = self.trials.list_by_tenant(tenant_id).await?;
        let addons = self.addons.list_by_tenant(tenant_id).await?;

        Ok(features
            .into_iter()
            .map(|feature| {
                let feature_trials: Vec<FeatureTrialProfile> = trials
                    .iter()
                    .filter(|t| t.feature_id == feature.id)
                    .cloned()
                    .collect();
                let resolution = resolve_access(
                    feature.id,
                    plan_features.contains(&feature.id),
                    &feature_trials,
                    &addons,
                    now,
                );
                let has_access = resolution.access_type.is_some();
                let trial_used = !feature_trials.is_empty();
                let addon_monthly_price_cents = feature.addon_price();

                FeatureEntitlement {
                    can_start_trial: feature.trial_eligible && !trial_used && !has_access,
                    addon_offered: addon_monthly_price_cents.is_some(),
                    addon_monthly_price_cents,
                    has_access,
                    access_type: resolution.access_type,
                    days_remaining: resolution.days_remaining,
                    expires_at: resolution.expires_at,
                    trial_eligible: feature.trial_eligible,
                    trial_used,
                    key: feature.key,
                    name: feature.name,
                    description: feature.description,
                }
            })
            .collect())
    }

    /// Start a trial. A tenant gets one trial per feature unless an operator grants another.
    pub async fn start_trial(
        &self,
        tenant_id: Uuid,
        feature_key: &str,
        operator_id: Option<Uuid>,
    ) -> AppResult<FeatureTrialProfile> {
        let feature = self
            .catalog
            .get_feature_by_key(feature_key)
            .await?
            .ok_or(AppError::NotFound)?;

        if !feature.trial_eligible {
            return Err(AppError::TrialUnavailable(format!(
                "{} is not available as a trial",
                feature.name
            )));
        }

        let now = Utc::now();
        let trials = self.trials.list_for_feature(tenant_id, feature.id).await?;

        if trials.iter().any(|t| t.is_running(now)) {
            return Err(AppError::TrialUnavailable(format!(
                "A trial of {} is already running",
                feature.name
            )));
        }

        // Active rows past their expiry have not been swept yet; close them first so the
        // one-active-trial constraint does not reject an operator-granted restart.
        for stale in trials
            .iter()
            .filter(|t| t.status == TrialStatus::Active && !t.is_running(now))
        {
            self.trials.end(stale.id, TrialStatus::Expired, now).await?;
        }

        if !trials.is_empty() && operator_id.is_none() {
            return Err(AppError::TrialUnavailable(format!(
                "The trial of {} has already been used",
                feature.name
            )));
        }

        let trial = self
            .trials
            .create(&NewFeatureTrial {
                tenant_id,
                feature_id: feature.id,
                started_at: now,
                expires_at: now + feature.trial_duration(),
                started_by: operator_id,
            })
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            feature = %feature.key,
            trial_id = %trial.id,
            operator_id = ?operator_id,
            expires_at = %trial.expires_at,
            "Started feature trial"
        );

        Ok(trial)
    }

    /// End a trial. Ending an already ended trial returns it unchanged.
    pub async fn end_trial(&self, trial_id: Uuid, reason: TrialEndReason) -> AppResult<FeatureTrialProfile> {
        let trial = self
            .trials
            .end(trial_id, reason.status(), Utc::now())
            .await?
            .ok_or(AppError::NotFound)?;

        tracing::info!(
            trial_id = %trial_id,
            reason = %reason,
            status = %trial.status,
            "Ended feature trial"
        );

        Ok(trial)
    }

    /// Buy a feature as a monthly add-on. It runs until cancelled, at the feature's
    /// current add-on price.
    pub async fn purchase_addon(&self, tenant_id: Uuid, feature_key: &str) -> AppResult<FeatureAddonProfile> {
        let feature = self
            .catalog
            .get_feature_by_key(feature_key)
            .await?
            .ok_or(AppError::NotFound)?;

        let Some(monthly_price_cents) = feature.addon_price() else {
            return Err(AppError::AddonUnavailable(format!(
                "{} is not offered as an add-on",
                feature.name
            )));
        };

        if self.plan_feature_ids(tenant_id).await?.contains(&feature.id) {
            return Err(AppError::AddonUnavailable(format!(
                "{} is already included in the plan",
                feature.name
            )));
        }

        let now = Utc::now();
        let addons = self.addons.list_by_tenant(tenant_id).await?;
        if addons.iter().any(|a| a.feature_id == feature.id && a.is_active(now)) {
            return Err(AppError::AddonUnavailable(format!(
                "{} is already active as an add-on",
                feature.name
            )));
        }

        // Active rows past their expiry would trip the one-active-add-on index.
        for lapsed in addons
            .iter()
            .filter(|a| a.feature_id == feature.id && a.status == AddonStatus::Active && !a.is_active(now))
        {
            self.addons.cancel(lapsed.id, now).await?;
        }

        let addon = self
            .addons
            .create(&NewFeatureAddon {
                tenant_id,
                feature_id: feature.id,
                started_at: now,
                expires_at: None,
                monthly_price_cents,
            })
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            feature = %feature.key,
            addon_id = %addon.id,
            monthly_price_cents,
            "Purchased feature add-on"
        );

        Ok(addon)
    }

    /// Cancel an add-on. Access ends immediately; cancelling twice returns the same row.
    pub async fn cancel_addon(&self, addon_id: Uuid) -> AppResult<FeatureAddonProfile> {
        let addon = self
            .addons
            .cancel(addon_id, Utc::now())
            .await?
            .ok_or(AppError::NotFound)?;

        tracing::info!(addon_id = %addon_id, tenant_id = %addon.tenant_id, "Cancelled feature add-on");

        Ok(addon)
    }

    pub async fn sweep_expired_trials(&self) -> AppResult<Vec<FeatureTrialProfile>> {
        let expired = self.trials.expire_due(Utc::now()).await?;
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired feature trials");
        }
        Ok(expired)
    }

    /// Claim due reminders for every threshold. Each trial gets each reminder at most once.
    pub async fn sweep_reminders(&self) -> AppResult<TrialReminderBatch> {
        let now = Utc::now();
        let mut batch = TrialReminderBatch::default();

        for threshold in ReminderThreshold::all() {
            let window_start = now + Duration::days(threshold.floor_days());
            let window_end = now + Duration::days(threshold.days());
            let claimed = self
                .trials
                .claim_reminders(*threshold, window_start, window_end)
                .await?;

            if !claimed.is_empty() {
                tracing::info!(
                    threshold_days = threshold.days(),
                    count = claimed.len(),
                    "Claimed trial reminders"
                );
            }

            match threshold {
                ReminderThreshold::SevenDays => batch.seven_day = claimed,
                ReminderThreshold::ThreeDays => batch.three_day = claimed,
                ReminderThreshold::OneDay => batch.one_day = claimed,
            }
        }

        Ok(batch)
    }
}

/// Resolve access in precedence order: plan, then running trial, then active add-on.
pub fn resolve_access(
    feature_id: Uuid,
    included_in_plan: bool,
    trials: &[FeatureTrialProfile],
    addons: &[FeatureAddonProfile],
    now: DateTime<Utc>,
) -> Resolution {
    if included_in_plan {
        return Resolution {
            access_type: Some(AccessType::Plan),
            days_remaining: None,
            expires_at: None,
        };
    }

    if let Some(trial) = trials
        .iter()
        .filter(|t| t.feature_id == feature_id && t.is_running(now))
        .max_by_key(|t| t.expires_at)
    {
        return Resolution {
            access_type: Some(AccessType::Trial),
            days_remaining: Some(days_remaining(trial.expires_at, now)),
            expires_at: Some(trial.expires_at),
        };
    }

    if let Some(addon) = addons
        .iter()
        .find(|a| a.feature_id == feature_id && a.is_active(now))
    {
        return Resolution {
            access_type: Some(AccessType::Addon),
            days_remaining: addon.expires_at.map(|e| days_remaining(e, now)),
            expires_at: addon.expires_at,
        };
    }

    Resolution {
        access_type: None,
        days_remaining: None,
        expires_at: None,
    }
}

/// Whole days left, rounded up. Zero once expired.
pub fn days_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expires_at - now).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    }
}
