//! In-memory mocks for the manual provider, directory ports, audit log and config store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::directory::{
            ActiveContract, BillingReader, PayerDirectory, PayerProfile, TenantDirectory,
            TenantProfile,
        },
        use_cases::{
            audit::{AuditLogEntry, NewAuditEntry, ProviderAuditLogRepo},
            gateway_settlement::PayerPaymentMethodProfile,
            manual_settlement::{
                MandateReplacement, NewSepaMandate, SepaMandateProfile, SepaMandateRepo,
            },
            provider_registry::{
                TenantPaymentConfigProfile, TenantPaymentConfigRepo, UpsertPaymentConfig,
            },
        },
    },
    domain::entities::{mandate_status::MandateStatus, payment_method::PaymentMethodKind},
};

// ============================================================================
// InMemorySepaMandateRepo
// ============================================================================

#[derive(Default)]
struct MandateState {
    mandates: HashMap<Uuid, SepaMandateProfile>,
    payment_methods: HashMap<(Uuid, Uuid), PayerPaymentMethodProfile>,
}

#[derive(Default)]
pub struct InMemorySepaMandateRepo {
    state: Mutex<MandateState>,
}

impl InMemorySepaMandateRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<SepaMandateProfile> {
        self.state.lock().unwrap().mandates.get(&id).cloned()
    }

    pub fn payment_method(&self, tenant_id: Uuid, payer_id: Uuid) -> Option<PayerPaymentMethodProfile> {
        self.state
            .lock()
            .unwrap()
            .payment_methods
            .get(&(tenant_id, payer_id))
            .cloned()
    }
}

fn revoke_in_place(
    mandates: &mut HashMap<Uuid, SepaMandateProfile>,
    tenant_id: Uuid,
    payer_id: Uuid,
    now: DateTime<Utc>,
) -> Option<SepaMandateProfile> {
    let active = mandates.values_mut().find(|m| {
        m.tenant_id == tenant_id && m.payer_id == payer_id && m.status == MandateStatus::Active
    })?;
    active.status = MandateStatus::Revoked;
    active.revoked_at = Some(now);
    Some(active.clone())
}

#[async_trait]
impl SepaMandateRepo for InMemorySepaMandateRepo {
    async fn replace_active(
        &self,
        mandate: &NewSepaMandate,
        now: DateTime<Utc>,
    ) -> AppResult<MandateReplacement> {
        let mut state = self.state.lock().unwrap();

        if state
            .mandates
            .values()
            .any(|m| m.mandate_reference == mandate.mandate_reference)
        {
            return Err(AppError::InvalidInput(
                "A record with this value already exists".into(),
            ));
        }

        let superseded = revoke_in_place(&mut state.mandates, mandate.tenant_id, mandate.payer_id, now);

        let profile = SepaMandateProfile {
            id: Uuid::new_v4(),
            tenant_id: mandate.tenant_id,
            payer_id: mandate.payer_id,
            iban: mandate.iban.clone(),
            bic: mandate.bic.clone(),
            payer_name: mandate.payer_name.clone(),
            bank_name: mandate.bank_name.clone(),
            mandate_reference: mandate.mandate_reference.clone(),
            creditor_id: mandate.creditor_id.clone(),
            status: MandateStatus::Active,
            created_at: now,
            revoked_at: None,
        };
        state.mandates.insert(profile.id, profile.clone());

        let key = (mandate.tenant_id, mandate.payer_id);
        let existing = state.payment_methods.get(&key).cloned();
        state.payment_methods.insert(
            key,
            PayerPaymentMethodProfile {
                tenant_id: mandate.tenant_id,
                payer_id: mandate.payer_id,
                method: PaymentMethodKind::SepaDebit,
                iban: Some(mandate.iban.clone()),
                bic: mandate.bic.clone(),
                account_holder: Some(mandate.payer_name.clone()),
                bank_name: mandate.bank_name.clone(),
                mandate_reference: Some(mandate.mandate_reference.clone()),
                gateway_customer_id: existing.as_ref().and_then(|m| m.gateway_customer_id.clone()),
                gateway_instrument_ref: existing.and_then(|m| m.gateway_instrument_ref),
                updated_at: now,
            },
        );

        Ok(MandateReplacement {
            mandate: profile,
            superseded,
        })
    }

    async fn get_active_for_payer(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
    ) -> AppResult<Option<SepaMandateProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .mandates
            .values()
            .find(|m| {
                m.tenant_id == tenant_id && m.payer_id == payer_id && m.status == MandateStatus::Active
            })
            .cloned())
    }

    async fn revoke_active(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<SepaMandateProfile>> {
        let mut state = self.state.lock().unwrap();
        Ok(revoke_in_place(&mut state.mandates, tenant_id, payer_id, now))
    }

    async fn list_active_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SepaMandateProfile>> {
        let mut active: Vec<SepaMandateProfile> = self
            .state
            .lock()
            .unwrap()
            .mandates
            .values()
            .filter(|m| m.tenant_id == tenant_id && m.status == MandateStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.payer_name.cmp(&b.payer_name).then(a.created_at.cmp(&b.created_at)));
        Ok(active)
    }
}

// ============================================================================
// Directory ports
// ============================================================================

#[derive(Default)]
pub struct InMemoryPayerDirectory {
    pub payers: Mutex<HashMap<Uuid, PayerProfile>>,
}

impl InMemoryPayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, payer: PayerProfile) -> PayerProfile {
        self.payers.lock().unwrap().insert(payer.id, payer.clone());
        payer
    }
}

#[async_trait]
impl PayerDirectory for InMemoryPayerDirectory {
    async fn get_payer(&self, tenant_id: Uuid, payer_id: Uuid) -> AppResult<Option<PayerProfile>> {
        Ok(self
            .payers
            .lock()
            .unwrap()
            .get(&payer_id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTenantDirectory {
    pub tenants: Mutex<HashMap<Uuid, TenantProfile>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant: TenantProfile) -> TenantProfile {
        self.tenants.lock().unwrap().insert(tenant.id, tenant.clone());
        tenant
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn get_tenant(&self, tenant_id: Uuid) -> AppResult<Option<TenantProfile>> {
        Ok(self.tenants.lock().unwrap().get(&tenant_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryBillingReader {
    pub contracts: Mutex<Vec<(Uuid, ActiveContract)>>,
    pub balances: Mutex<HashMap<Uuid, i64>>,
}

impl InMemoryBillingReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contract(&self, (tenant_id, contract): (Uuid, ActiveContract)) {
        self.contracts.lock().unwrap().push((tenant_id, contract));
    }

    pub fn set_open_balance(&self, payer_id: Uuid, balance_cents: i64) {
        self.balances.lock().unwrap().insert(payer_id, balance_cents);
    }
}

#[async_trait]
impl BillingReader for InMemoryBillingReader {
    async fn list_active_contracts(&self, tenant_id: Uuid) -> AppResult<Vec<ActiveContract>> {
        Ok(self
            .contracts
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == tenant_id)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn open_invoice_balances(&self, tenant_id: Uuid) -> AppResult<HashMap<Uuid, i64>> {
        let payer_ids: Vec<Uuid> = self
            .contracts
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == tenant_id)
            .map(|(_, c)| c.payer_id)
            .collect();
        let balances = self.balances.lock().unwrap();
        Ok(payer_ids
            .into_iter()
            .filter_map(|id| balances.get(&id).map(|b| (id, *b)))
            .collect())
    }
}

// ============================================================================
// InMemoryAuditLogRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryAuditLogRepo {
    entries: Mutex<Vec<AuditLogEntry>>,
    failing: AtomicBool,
}

impl InMemoryAuditLogRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in the order they were appended.
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn fail_appends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderAuditLogRepo for InMemoryAuditLogRepo {
    async fn append(&self, entry: &NewAuditEntry) -> AppResult<AuditLogEntry> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Database("audit log unavailable".into()));
        }
        let logged = AuditLogEntry {
            id: Uuid::new_v4(),
            tenant_id: entry.tenant_id,
            payer_id: entry.payer_id,
            provider: entry.provider,
            action: entry.action.to_string(),
            status: entry.status.to_string(),
            message: entry.message.clone(),
            created_at: Utc::now(),
        };
        self.entries.lock().unwrap().push(logged.clone());
        Ok(logged)
    }

    async fn list_recent(&self, tenant_id: Uuid, limit: i64) -> AppResult<Vec<AuditLogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// ============================================================================
// InMemoryPaymentConfigRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPaymentConfigRepo {
    configs: Mutex<HashMap<Uuid, TenantPaymentConfigProfile>>,
    failing_reads: AtomicBool,
}

impl InMemoryPaymentConfigRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: Uuid) -> Option<TenantPaymentConfigProfile> {
        self.configs.lock().unwrap().get(&tenant_id).cloned()
    }

    pub fn fail_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Replace the stored secret key with bytes the cipher cannot decrypt.
    pub fn corrupt_secret_key(&self, tenant_id: Uuid) {
        if let Some(config) = self.configs.lock().unwrap().get_mut(&tenant_id) {
            config.gateway_secret_key_encrypted = Some("bm90LWEtY2lwaGVydGV4dA==".to_string());
        }
    }
}

#[async_trait]
impl TenantPaymentConfigRepo for InMemoryPaymentConfigRepo {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<TenantPaymentConfigProfile>> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(AppError::Database("config store unavailable".into()));
        }
        Ok(self.get(tenant_id))
    }

    async fn upsert(&self, config: &UpsertPaymentConfig) -> AppResult<TenantPaymentConfigProfile> {
        let mut configs = self.configs.lock().unwrap();
        let now = Utc::now();
        let profile = TenantPaymentConfigProfile {
            tenant_id: config.tenant_id,
            provider: config.provider,
            creditor_id: config.creditor_id.clone(),
            gateway_secret_key_encrypted: config.gateway_secret_key_encrypted.clone(),
            gateway_publishable_key: config.gateway_publishable_key.clone(),
            gateway_webhook_secret_encrypted: config.gateway_webhook_secret_encrypted.clone(),
            created_at: configs
                .get(&config.tenant_id)
                .map(|c| c.created_at)
                .unwrap_or(now),
            updated_at: now,
        };
        configs.insert(config.tenant_id, profile.clone());
        Ok(profile)
    }
}
