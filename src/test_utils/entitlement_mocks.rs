//! In-memory mocks for the plan catalog, feature trials and add-ons.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::entitlement::{
        FeatureAddonProfile, FeatureAddonRepo, FeatureProfile, FeatureTrialProfile,
        FeatureTrialRepo, NewFeatureAddon, NewFeatureTrial, PlanCatalogRepo, PlanProfile,
    },
    domain::entities::{
        addon_status::AddonStatus,
        trial_status::{ReminderThreshold, TrialStatus},
    },
};

// ============================================================================
// InMemoryPlanCatalog
// ============================================================================

#[derive(Default)]
pub struct InMemoryPlanCatalog {
    pub plans: Mutex<HashMap<Uuid, PlanProfile>>,
    pub features: Mutex<HashMap<Uuid, FeatureProfile>>,
    pub plan_features: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    pub tenant_plans: Mutex<HashMap<Uuid, Uuid>>,
}

impl InMemoryPlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&self, feature: FeatureProfile) -> FeatureProfile {
        self.features.lock().unwrap().insert(feature.id, feature.clone());
        feature
    }

    pub fn add_plan(&self, plan: PlanProfile, feature_ids: &[Uuid]) -> PlanProfile {
        self.plans.lock().unwrap().insert(plan.id, plan.clone());
        self.plan_features
            .lock()
            .unwrap()
            .insert(plan.id, feature_ids.to_vec());
        plan
    }

    pub fn set_tenant_plan(&self, tenant_id: Uuid, plan_id: Uuid) {
        self.tenant_plans.lock().unwrap().insert(tenant_id, plan_id);
    }
}

#[async_trait]
impl PlanCatalogRepo for InMemoryPlanCatalog {
    async fn get_tenant_plan(&self, tenant_id: Uuid) -> AppResult<Option<PlanProfile>> {
        let plan_id = self.tenant_plans.lock().unwrap().get(&tenant_id).copied();
        Ok(plan_id.and_then(|id| self.plans.lock().unwrap().get(&id).cloned()))
    }

    async fn get_feature_by_key(&self, key: &str) -> AppResult<Option<FeatureProfile>> {
        Ok(self
            .features
            .lock()
            .unwrap()
            .values()
            .find(|f| f.key == key)
            .cloned())
    }

    async fn list_features(&self) -> AppResult<Vec<FeatureProfile>> {
        let mut features: Vec<FeatureProfile> =
            self.features.lock().unwrap().values().cloned().collect();
        features.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(features)
    }

    async fn list_plan_feature_ids(&self, plan_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .plan_features
            .lock()
            .unwrap()
            .get(&plan_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_plans_including(&self, feature_id: Uuid) -> AppResult<Vec<PlanProfile>> {
        let plan_ids: Vec<Uuid> = self
            .plan_features
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, features)| features.contains(&feature_id))
            .map(|(plan_id, _)| *plan_id)
            .collect();
        let plans = self.plans.lock().unwrap();
        let mut including: Vec<PlanProfile> = plan_ids
            .iter()
            .filter_map(|id| plans.get(id).cloned())
            .collect();
        including.sort_by_key(|p| p.monthly_price_cents);
        Ok(including)
    }
}

// ============================================================================
// InMemoryFeatureTrialRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryFeatureTrialRepo {
    pub trials: Mutex<HashMap<Uuid, FeatureTrialProfile>>,
}

impl InMemoryFeatureTrialRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, trial: FeatureTrialProfile) -> FeatureTrialProfile {
        self.trials.lock().unwrap().insert(trial.id, trial.clone());
        trial
    }

    pub fn get(&self, id: Uuid) -> Option<FeatureTrialProfile> {
        self.trials.lock().unwrap().get(&id).cloned()
    }
}

fn newest_first(mut trials: Vec<FeatureTrialProfile>) -> Vec<FeatureTrialProfile> {
    trials.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    trials
}

#[async_trait]
impl FeatureTrialRepo for InMemoryFeatureTrialRepo {
    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<FeatureTrialProfile>> {
        Ok(newest_first(
            self.trials
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.tenant_id == tenant_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_feature(
        &self,
        tenant_id: Uuid,
        feature_id: Uuid,
    ) -> AppResult<Vec<FeatureTrialProfile>> {
        Ok(newest_first(
            self.trials
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.tenant_id == tenant_id && t.feature_id == feature_id)
                .cloned()
                .collect(),
        ))
    }

    async fn create(&self, trial: &NewFeatureTrial) -> AppResult<FeatureTrialProfile> {
        let mut trials = self.trials.lock().unwrap();
        if trials.values().any(|t| {
            t.tenant_id == trial.tenant_id
                && t.feature_id == trial.feature_id
                && t.status == TrialStatus::Active
        }) {
            return Err(AppError::TrialUnavailable(
                "A trial for this feature is already running".into(),
            ));
        }
        let profile = FeatureTrialProfile {
            id: Uuid::new_v4(),
            tenant_id: trial.tenant_id,
            feature_id: trial.feature_id,
            started_at: trial.started_at,
            expires_at: trial.expires_at,
            status: TrialStatus::Active,
            ended_at: None,
            started_by: trial.started_by,
            reminder_7d_sent: false,
            reminder_3d_sent: false,
            reminder_1d_sent: false,
        };
        trials.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn end(
        &self,
        trial_id: Uuid,
        status: TrialStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<FeatureTrialProfile>> {
        let mut trials = self.trials.lock().unwrap();
        let Some(trial) = trials.get_mut(&trial_id) else {
            return Ok(None);
        };
        if trial.status == TrialStatus::Active {
            trial.status = status;
            trial.ended_at = Some(now);
        }
        Ok(Some(trial.clone()))
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> AppResult<Vec<FeatureTrialProfile>> {
        let mut trials = self.trials.lock().unwrap();
        Ok(trials
            .values_mut()
            .filter(|t| t.status == TrialStatus::Active && t.expires_at <= now)
            .map(|t| {
                t.status = TrialStatus::Expired;
                t.ended_at = Some(now);
                t.clone()
            })
            .collect())
    }

    async fn claim_reminders(
        &self,
        threshold: ReminderThreshold,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<FeatureTrialProfile>> {
        let mut trials = self.trials.lock().unwrap();
        let mut claimed = Vec::new();
        for trial in trials.values_mut() {
            if trial.status != TrialStatus::Active
                || trial.expires_at <= window_start
                || trial.expires_at > window_end
            {
                continue;
            }
            let flag = match threshold {
                ReminderThreshold::SevenDays => &mut trial.reminder_7d_sent,
                ReminderThreshold::ThreeDays => &mut trial.reminder_3d_sent,
                ReminderThreshold::OneDay => &mut trial.reminder_1d_sent,
            };
            if *flag {
                continue;
            }
            *flag = true;
            claimed.push(trial.clone());
        }
        Ok(claimed)
    }
}

// ============================================================================
// InMemoryFeatureAddonRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryFeatureAddonRepo {
    pub addons: Mutex<Vec<FeatureAddonProfile>>,
}

impl InMemoryFeatureAddonRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, addon: FeatureAddonProfile) -> FeatureAddonProfile {
        self.addons.lock().unwrap().push(addon.clone());
        addon
    }

    pub fn get(&self, addon_id: Uuid) -> Option<FeatureAddonProfile> {
        self.addons.lock().unwrap().iter().find(|a| a.id == addon_id).cloned()
    }
}

#[async_trait]
impl FeatureAddonRepo for InMemoryFeatureAddonRepo {
    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<FeatureAddonProfile>> {
        Ok(self
            .addons
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn create(&self, addon: &NewFeatureAddon) -> AppResult<FeatureAddonProfile> {
        let mut addons = self.addons.lock().unwrap();
        if addons.iter().any(|a| {
            a.tenant_id == addon.tenant_id
                && a.feature_id == addon.feature_id
                && a.status == AddonStatus::Active
        }) {
            return Err(AppError::AddonUnavailable(
                "This feature is already active as an add-on".into(),
            ));
        }
        let profile = FeatureAddonProfile {
            id: Uuid::new_v4(),
            tenant_id: addon.tenant_id,
            feature_id: addon.feature_id,
            started_at: addon.started_at,
            expires_at: addon.expires_at,
            monthly_price_cents: addon.monthly_price_cents,
            status: AddonStatus::Active,
        };
        addons.push(profile.clone());
        Ok(profile)
    }

    async fn cancel(&self, addon_id: Uuid, now: DateTime<Utc>) -> AppResult<Option<FeatureAddonProfile>> {
        let mut addons = self.addons.lock().unwrap();
        let Some(addon) = addons.iter_mut().find(|a| a.id == addon_id) else {
            return Ok(None);
        };
        if addon.status == AddonStatus::Active {
            addon.status = AddonStatus::Cancelled;
            addon.expires_at = Some(addon.expires_at.map_or(now, |e| e.min(now)));
        }
        Ok(Some(addon.clone()))
    }
}
