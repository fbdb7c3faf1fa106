//! In-memory gateway store plus mock gateway and ledger clients.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::{
            gateway::{CreateIntentRequest, CreatedIntent, GatewayApi, WebhookTransition},
            ledger::{AccountingRecord, LedgerExporter},
        },
        use_cases::{
            gateway_settlement::{
                NewPaymentIntent, NewWebhookEvent, PayerPaymentMethodProfile,
                PayerPaymentMethodRepo, PaymentIntentProfile, PaymentIntentRepo,
                WebhookApplyOutcome, WebhookEventRepo,
            },
            ledger_export::{LedgerExportJob, LedgerExportProfile, LedgerExportRepo},
        },
    },
    domain::entities::{
        ledger_export_status::LedgerExportStatus, payment_intent_status::PaymentIntentStatus,
        payment_method::PaymentMethodKind,
    },
};

// ============================================================================
// InMemoryGatewayStore
// ============================================================================

#[derive(Default)]
struct GatewayState {
    intents: HashMap<Uuid, PaymentIntentProfile>,
    payment_methods: HashMap<(Uuid, Uuid), PayerPaymentMethodProfile>,
    seen_events: HashSet<String>,
    ledger: Vec<LedgerExportProfile>,
}

/// Intents, payment methods, webhook events and ledger entries behind one lock, so
/// `apply_once` is atomic the way the database transaction is.
#[derive(Default)]
pub struct InMemoryGatewayStore {
    state: Mutex<GatewayState>,
}

impl InMemoryGatewayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_intent(&self, intent: PaymentIntentProfile) -> PaymentIntentProfile {
        self.state
            .lock()
            .unwrap()
            .intents
            .insert(intent.id, intent.clone());
        intent
    }

    pub fn insert_ledger_entry(&self, entry: LedgerExportProfile) -> LedgerExportProfile {
        self.state.lock().unwrap().ledger.push(entry.clone());
        entry
    }

    pub fn intent_count(&self) -> usize {
        self.state.lock().unwrap().intents.len()
    }

    pub fn ledger_entries(&self) -> Vec<LedgerExportProfile> {
        self.state.lock().unwrap().ledger.clone()
    }

    pub fn set_gateway_customer(&self, tenant_id: Uuid, payer_id: Uuid, customer_id: &str) {
        let mut state = self.state.lock().unwrap();
        let method = state
            .payment_methods
            .entry((tenant_id, payer_id))
            .or_insert_with(|| empty_method(tenant_id, payer_id, PaymentMethodKind::Card));
        method.gateway_customer_id = Some(customer_id.to_string());
    }
}

fn empty_method(tenant_id: Uuid, payer_id: Uuid, method: PaymentMethodKind) -> PayerPaymentMethodProfile {
    PayerPaymentMethodProfile {
        tenant_id,
        payer_id,
        method,
        iban: None,
        bic: None,
        account_holder: None,
        bank_name: None,
        mandate_reference: None,
        gateway_customer_id: None,
        gateway_instrument_ref: None,
        updated_at: Utc::now(),
    }
}

fn find_intent<'a>(
    state: &'a mut GatewayState,
    tenant_id: Uuid,
    external_id: &str,
) -> Option<&'a mut PaymentIntentProfile> {
    state
        .intents
        .values_mut()
        .find(|i| i.tenant_id == tenant_id && i.external_id == external_id)
}

#[async_trait]
impl PaymentIntentRepo for InMemoryGatewayStore {
    async fn create(&self, intent: &NewPaymentIntent) -> AppResult<PaymentIntentProfile> {
        let mut state = self.state.lock().unwrap();
        if state.intents.values().any(|i| i.external_id == intent.external_id) {
            return Err(AppError::InvalidInput(
                "A record with this value already exists".into(),
            ));
        }
        let now = Utc::now();
        let profile = PaymentIntentProfile {
            id: Uuid::new_v4(),
            tenant_id: intent.tenant_id,
            payer_id: intent.payer_id,
            external_id: intent.external_id.clone(),
            amount_cents: intent.amount_cents,
            currency: intent.currency.clone(),
            status: PaymentIntentStatus::RequiresAction,
            description: intent.description.clone(),
            metadata: intent.metadata.clone(),
            failure_message: None,
            created_at: now,
            updated_at: now,
        };
        state.intents.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_by_external_id(
        &self,
        tenant_id: Uuid,
        external_id: &str,
    ) -> AppResult<Option<PaymentIntentProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .intents
            .values()
            .find(|i| i.tenant_id == tenant_id && i.external_id == external_id)
            .cloned())
    }
}

#[async_trait]
impl PayerPaymentMethodRepo for InMemoryGatewayStore {
    async fn get(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
    ) -> AppResult<Option<PayerPaymentMethodProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payment_methods
            .get(&(tenant_id, payer_id))
            .cloned())
    }
}

#[async_trait]
impl WebhookEventRepo for InMemoryGatewayStore {
    async fn apply_once(
        &self,
        event: &NewWebhookEvent,
        transition: &WebhookTransition,
        now: DateTime<Utc>,
    ) -> AppResult<WebhookApplyOutcome> {
        let mut state = self.state.lock().unwrap();
        if !state.seen_events.insert(event.external_id.clone()) {
            return Ok(WebhookApplyOutcome::Duplicate);
        }

        let mut intent = None;
        let mut ledger_entry = None;

        match transition {
            WebhookTransition::IntentSucceeded { external_id } => {
                if let Some(found) = find_intent(&mut state, event.tenant_id, external_id)
                    .filter(|i| i.status.can_succeed())
                {
                    found.status = PaymentIntentStatus::Succeeded;
                    found.failure_message = None;
                    found.updated_at = now;
                    intent = Some(found.clone());
                }
                if let Some(succeeded) = &intent {
                    if !state.ledger.iter().any(|e| e.payment_intent_id == succeeded.id) {
                        let entry = LedgerExportProfile {
                            id: Uuid::new_v4(),
                            tenant_id: succeeded.tenant_id,
                            payment_intent_id: succeeded.id,
                            status: LedgerExportStatus::Pending,
                            response_payload: None,
                            error_message: None,
                            attempt_count: 0,
                            next_attempt_at: None,
                            locked_at: Some(now),
                            processed_at: None,
                            created_at: now,
                        };
                        state.ledger.push(entry.clone());
                        ledger_entry = Some(entry);
                    }
                }
            }
            WebhookTransition::IntentFailed {
                external_id,
                failure_message,
            } => {
                if let Some(found) = find_intent(&mut state, event.tenant_id, external_id)
                    .filter(|i| i.status.can_fail())
                {
                    found.status = PaymentIntentStatus::Failed;
                    found.failure_message = Some(failure_message.clone());
                    found.updated_at = now;
                    intent = Some(found.clone());
                }
            }
            WebhookTransition::InstrumentSaved {
                payer_id,
                customer_id,
                instrument_ref,
            } => {
                let method = state
                    .payment_methods
                    .entry((event.tenant_id, *payer_id))
                    .or_insert_with(|| empty_method(event.tenant_id, *payer_id, PaymentMethodKind::Card));
                if customer_id.is_some() {
                    method.gateway_customer_id = customer_id.clone();
                }
                method.gateway_instrument_ref = Some(instrument_ref.clone());
                method.updated_at = now;
            }
            WebhookTransition::Ignore { .. } => {}
        }

        Ok(WebhookApplyOutcome::Applied {
            intent,
            ledger_entry,
        })
    }
}

#[async_trait]
impl LedgerExportRepo for InMemoryGatewayStore {
    async fn claim_due(
        &self,
        limit: i64,
        max_attempts: i32,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> AppResult<Vec<LedgerExportJob>> {
        let mut state = self.state.lock().unwrap();
        let GatewayState { intents, ledger, .. } = &mut *state;

        let mut due: Vec<&mut LedgerExportProfile> = ledger
            .iter_mut()
            .filter(|e| {
                matches!(e.status, LedgerExportStatus::Pending | LedgerExportStatus::Failed)
                    && e.attempt_count < max_attempts
                    && e.next_attempt_at.is_none_or(|at| at <= now)
                    && e.locked_at.is_none_or(|at| at < stale_before)
            })
            .collect();
        due.sort_by_key(|e| e.created_at);

        let mut jobs = Vec::new();
        for entry in due.into_iter().take(limit.max(0) as usize) {
            let Some(intent) = intents.get(&entry.payment_intent_id) else {
                continue;
            };
            entry.locked_at = Some(now);
            jobs.push(LedgerExportJob {
                entry: entry.clone(),
                intent: intent.clone(),
            });
        }
        Ok(jobs)
    }

    async fn mark_success(&self, id: Uuid, response: &JsonValue, now: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .ledger
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AppError::NotFound)?;
        entry.status = LedgerExportStatus::Success;
        entry.response_payload = Some(response.clone());
        entry.error_message = None;
        entry.processed_at = Some(now);
        entry.next_attempt_at = None;
        entry.locked_at = None;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempt_count: i32,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .ledger
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AppError::NotFound)?;
        entry.status = LedgerExportStatus::Failed;
        entry.attempt_count = attempt_count;
        entry.error_message = Some(error.to_string());
        entry.next_attempt_at = next_attempt_at;
        entry.locked_at = None;
        Ok(())
    }
}

// ============================================================================
// MockGatewayApi
// ============================================================================

/// Records every request. Returns `pi_mock_<n>` intents unless told to fail.
#[derive(Default)]
pub struct MockGatewayApi {
    requests: Mutex<Vec<CreateIntentRequest>>,
    failure: Mutex<Option<String>>,
}

impl MockGatewayApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn requests(&self) -> Vec<CreateIntentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayApi for MockGatewayApi {
    async fn create_payment_intent(&self, request: &CreateIntentRequest) -> AppResult<CreatedIntent> {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(AppError::InvalidInput(message));
        }
        Ok(CreatedIntent {
            external_id: format!("pi_mock_{count}"),
            client_secret: Some(format!("pi_mock_{count}_secret")),
            status: "requires_payment_method".to_string(),
        })
    }
}

// ============================================================================
// MockLedgerExporter
// ============================================================================

#[derive(Default)]
pub struct MockLedgerExporter {
    submitted: Mutex<Vec<AccountingRecord>>,
    failure: Mutex<Option<String>>,
}

impl MockLedgerExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Records that were accepted.
    pub fn submitted(&self) -> Vec<AccountingRecord> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerExporter for MockLedgerExporter {
    async fn submit(&self, record: &AccountingRecord) -> AppResult<JsonValue> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(AppError::Internal(message));
        }
        self.submitted.lock().unwrap().push(record.clone());
        Ok(json!({ "booking_id": record.booking_id, "accepted": true }))
    }
}
