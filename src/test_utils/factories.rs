//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    application::{
        ports::directory::{ActiveContract, PayerProfile, PostalAddress, TenantProfile},
        use_cases::{
            entitlement::{FeatureAddonProfile, FeatureProfile, FeatureTrialProfile, PlanProfile},
            gateway_settlement::{GatewaySettlementPorts, PaymentIntentProfile},
            ledger_export::{LedgerAccounts, LedgerExportProfile, LedgerExportUseCases},
            manual_settlement::ManualSettlementPorts,
        },
    },
    domain::entities::{
        addon_status::AddonStatus, ledger_export_status::LedgerExportStatus,
        payment_intent_status::PaymentIntentStatus, payment_method::PaymentMethodKind,
        trial_status::TrialStatus,
    },
    infra::crypto::ProcessCipher,
};

use super::{
    InMemoryAuditLogRepo, InMemoryBillingReader, InMemoryGatewayStore, InMemoryPayerDirectory,
    InMemorySepaMandateRepo, InMemoryTenantDirectory, MockLedgerExporter,
};

const TEST_ENCRYPTION_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

pub fn test_cipher() -> ProcessCipher {
    ProcessCipher::new_from_base64(TEST_ENCRYPTION_KEY).expect("test key is 32 bytes")
}

pub fn test_ledger_accounts() -> LedgerAccounts {
    LedgerAccounts {
        debit_account: "1200".to_string(),
        credit_account: "8400".to_string(),
    }
}

fn test_address() -> PostalAddress {
    PostalAddress {
        street: Some("Hauptstr. 1".to_string()),
        postal_code: Some("50667".to_string()),
        city: Some("Köln".to_string()),
    }
}

/// Manual provider collaborators backed by fresh in-memory stores.
pub fn test_manual_ports(audit: Arc<InMemoryAuditLogRepo>) -> ManualSettlementPorts {
    ManualSettlementPorts {
        mandates: Arc::new(InMemorySepaMandateRepo::new()),
        payers: Arc::new(InMemoryPayerDirectory::new()),
        tenants: Arc::new(InMemoryTenantDirectory::new()),
        billing: Arc::new(InMemoryBillingReader::new()),
        audit,
    }
}

/// Gateway provider collaborators backed by a fresh in-memory store and exporter.
pub fn test_gateway_ports(audit: Arc<InMemoryAuditLogRepo>) -> GatewaySettlementPorts {
    let store = Arc::new(InMemoryGatewayStore::new());
    let ledger = Arc::new(LedgerExportUseCases::new(
        store.clone(),
        Arc::new(MockLedgerExporter::new()),
        audit.clone(),
        test_ledger_accounts(),
    ));
    GatewaySettlementPorts {
        intents: store.clone(),
        payment_methods: store.clone(),
        webhooks: store,
        ledger,
        audit,
    }
}

// ============================================================================
// Settlement fixtures
// ============================================================================

pub fn create_test_tenant(tenant_id: Uuid, overrides: impl FnOnce(&mut TenantProfile)) -> TenantProfile {
    let mut tenant = TenantProfile {
        id: tenant_id,
        name: "Studio Rheinblick".to_string(),
        address: test_address(),
    };
    overrides(&mut tenant);
    tenant
}

/// Create a test payer who settles by direct debit.
pub fn create_test_payer(tenant_id: Uuid, overrides: impl FnOnce(&mut PayerProfile)) -> PayerProfile {
    let id = Uuid::new_v4();
    let mut payer = PayerProfile {
        id,
        tenant_id,
        display_name: "Max Mustermann".to_string(),
        email: Some(format!("member-{}@example.com", id.simple())),
        address: test_address(),
        payment_method: Some(PaymentMethodKind::SepaDebit),
    };
    overrides(&mut payer);
    payer
}

/// Create an active contract, returned with the tenant it belongs to.
pub fn create_test_contract(
    tenant_id: Uuid,
    payer_id: Uuid,
    overrides: impl FnOnce(&mut ActiveContract),
) -> (Uuid, ActiveContract) {
    let mut contract = ActiveContract {
        contract_id: Uuid::new_v4(),
        payer_id,
        payer_name: "Max Mustermann".to_string(),
        plan_name: "Basic".to_string(),
        monthly_fee_cents: 4990,
        payment_method: PaymentMethodKind::SepaDebit,
    };
    overrides(&mut contract);
    (tenant_id, contract)
}

// ============================================================================
// Gateway fixtures
// ============================================================================

/// Create a settled gateway payment intent.
pub fn create_test_intent(
    tenant_id: Uuid,
    overrides: impl FnOnce(&mut PaymentIntentProfile),
) -> PaymentIntentProfile {
    let now = Utc::now();
    let payer_id = Uuid::new_v4();
    let mut intent = PaymentIntentProfile {
        id: Uuid::new_v4(),
        tenant_id,
        payer_id,
        external_id: format!("pi_test_{}", Uuid::new_v4().simple()),
        amount_cents: 4990,
        currency: "EUR".to_string(),
        status: PaymentIntentStatus::Succeeded,
        description: "Monthly fee".to_string(),
        metadata: json!({ "tenant_id": tenant_id.to_string(), "payer_id": payer_id.to_string() }),
        failure_message: None,
        created_at: now,
        updated_at: now,
    };
    overrides(&mut intent);
    intent
}

/// Create an unlocked, never attempted ledger entry for `intent`.
pub fn create_test_ledger_entry(
    intent: &PaymentIntentProfile,
    overrides: impl FnOnce(&mut LedgerExportProfile),
) -> LedgerExportProfile {
    let mut entry = LedgerExportProfile {
        id: Uuid::new_v4(),
        tenant_id: intent.tenant_id,
        payment_intent_id: intent.id,
        status: LedgerExportStatus::Pending,
        response_payload: None,
        error_message: None,
        attempt_count: 0,
        next_attempt_at: None,
        locked_at: None,
        processed_at: None,
        created_at: Utc::now() - Duration::minutes(10),
    };
    overrides(&mut entry);
    entry
}

// ============================================================================
// Entitlement fixtures
// ============================================================================

/// Create a trial-eligible feature with a unique key.
pub fn create_test_feature(overrides: impl FnOnce(&mut FeatureProfile)) -> FeatureProfile {
    let id = Uuid::new_v4();
    let mut feature = FeatureProfile {
        id,
        key: format!("feature_{}", &id.simple().to_string()[..8]),
        name: "Online Booking".to_string(),
        description: Some("Let members book classes online".to_string()),
        trial_eligible: true,
        trial_days: Some(14),
        addon_available: false,
        addon_monthly_price_cents: None,
    };
    overrides(&mut feature);
    feature
}

pub fn create_test_plan(overrides: impl FnOnce(&mut PlanProfile)) -> PlanProfile {
    let mut plan = PlanProfile {
        id: Uuid::new_v4(),
        code: "basic".to_string(),
        name: "Basic".to_string(),
        monthly_price_cents: 2900,
    };
    overrides(&mut plan);
    plan
}

/// Create a running trial that started now and lasts 14 days.
pub fn create_test_trial(
    tenant_id: Uuid,
    feature_id: Uuid,
    overrides: impl FnOnce(&mut FeatureTrialProfile),
) -> FeatureTrialProfile {
    let now = Utc::now();
    let mut trial = FeatureTrialProfile {
        id: Uuid::new_v4(),
        tenant_id,
        feature_id,
        started_at: now,
        expires_at: now + Duration::days(14),
        status: TrialStatus::Active,
        ended_at: None,
        started_by: None,
        reminder_7d_sent: false,
        reminder_3d_sent: false,
        reminder_1d_sent: false,
    };
    overrides(&mut trial);
    trial
}

pub fn create_test_addon(
    tenant_id: Uuid,
    feature_id: Uuid,
    overrides: impl FnOnce(&mut FeatureAddonProfile),
) -> FeatureAddonProfile {
    let now = Utc::now();
    let mut addon = FeatureAddonProfile {
        id: Uuid::new_v4(),
        tenant_id,
        feature_id,
        started_at: now - Duration::days(3),
        expires_at: Some(now + Duration::days(27)),
        monthly_price_cents: 990,
        status: AddonStatus::Active,
    };
    overrides(&mut addon);
    addon
}
