use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::gateway::{
        CreateIntentRequest, GatewayApi, GatewayWebhookEvent, WebhookTransition,
    },
    domain::entities::{
        payment_intent_status::PaymentIntentStatus, payment_method::PaymentMethodKind,
        provider_kind::ProviderKind,
    },
    infra::gateway_client::verify_webhook_signature,
};

use super::{
    audit::{AuditAction, ProviderAuditLogRepo, capture_provider_failure},
    ledger_export::{LedgerExportJob, LedgerExportProfile, LedgerExportUseCases},
    manual_settlement::SETTLEMENT_CURRENCY,
};

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub payer_id: Uuid,
    pub external_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub description: String,
    pub metadata: JsonValue,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub tenant_id: Uuid,
    pub payer_id: Uuid,
    pub external_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub metadata: JsonValue,
}

/// The payer's stored settlement instrument, shared by both providers.
#[derive(Debug, Clone, Serialize)]
pub struct PayerPaymentMethodProfile {
    pub tenant_id: Uuid,
    pub payer_id: Uuid,
    pub method: PaymentMethodKind,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub account_holder: Option<String>,
    pub bank_name: Option<String>,
    pub mandate_reference: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub gateway_instrument_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub tenant_id: Uuid,
    pub external_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub payload_raw: String,
}

#[derive(Debug, Clone)]
pub enum WebhookApplyOutcome {
    /// The event id was seen before; nothing was changed.
    Duplicate,
    Applied {
        /// The intent the transition moved, if any.
        intent: Option<PaymentIntentProfile>,
        /// Ledger entry created by a successful payment, locked for immediate export.
        ledger_entry: Option<LedgerExportProfile>,
    },
}

#[async_trait]
pub trait PaymentIntentRepo: Send + Sync {
    async fn create(&self, intent: &NewPaymentIntent) -> AppResult<PaymentIntentProfile>;

    async fn get_by_external_id(
        &self,
        tenant_id: Uuid,
        external_id: &str,
    ) -> AppResult<Option<PaymentIntentProfile>>;
}

#[async_trait]
pub trait PayerPaymentMethodRepo: Send + Sync {
    async fn get(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
    ) -> AppResult<Option<PayerPaymentMethodProfile>>;
}

#[async_trait]
pub trait WebhookEventRepo: Send + Sync {
    /// Insert the event and apply `transition` in the same transaction.
    ///
    /// When the event id already exists nothing is applied and `Duplicate` is returned.
    /// A successful payment also creates the intent's ledger entry, at most once.
    async fn apply_once(
        &self,
        event: &NewWebhookEvent,
        transition: &WebhookTransition,
        now: DateTime<Utc>,
    ) -> AppResult<WebhookApplyOutcome>;
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentIntentInput {
    pub amount_cents: i64,
    pub currency: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentCreated {
    pub payment_intent_id: Uuid,
    pub external_id: String,
    pub client_secret: Option<String>,
    pub publishable_key: Option<String>,
    pub status: PaymentIntentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookHandling {
    Processed,
    Duplicate,
    Ignored,
}

// ============================================================================
// Provider
// ============================================================================

#[derive(Clone)]
pub struct GatewaySettlementPorts {
    pub intents: Arc<dyn PaymentIntentRepo>,
    pub payment_methods: Arc<dyn PayerPaymentMethodRepo>,
    pub webhooks: Arc<dyn WebhookEventRepo>,
    pub ledger: Arc<LedgerExportUseCases>,
    pub audit: Arc<dyn ProviderAuditLogRepo>,
}

/// Hosted-gateway settlement for one tenant.
///
/// Intents are created here; every later state change arrives through webhooks.
pub struct GatewaySettlementProvider {
    tenant_id: Uuid,
    api: Option<Arc<dyn GatewayApi>>,
    publishable_key: Option<String>,
    webhook_secret: Option<SecretString>,
    ports: GatewaySettlementPorts,
}

impl GatewaySettlementProvider {
    pub fn new(
        tenant_id: Uuid,
        api: Option<Arc<dyn GatewayApi>>,
        publishable_key: Option<String>,
        webhook_secret: Option<SecretString>,
        ports: GatewaySettlementPorts,
    ) -> Self {
        Self {
            tenant_id,
            api,
            publishable_key,
            webhook_secret,
            ports,
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_some()
    }

    pub async fn create_payment_intent(
        &self,
        payer_id: Uuid,
        input: CreatePaymentIntentInput,
    ) -> AppResult<PaymentIntentCreated> {
        let api = self
            .api
            .as_ref()
            .ok_or_else(|| AppError::NotConfigured("payment gateway credentials".into()))?;

        if input.amount_cents <= 0 {
            return Err(AppError::InvalidInput("Amount must be positive".into()));
        }
        let description = input.description.trim().to_string();
        if description.is_empty() {
            return Err(AppError::InvalidInput("Description is required".into()));
        }
        let currency = input
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(SETTLEMENT_CURRENCY)
            .to_uppercase();

        let customer_id = self
            .ports
            .payment_methods
            .get(self.tenant_id, payer_id)
            .await?
            .and_then(|m| m.gateway_customer_id);

        let metadata = HashMap::from([
            ("tenant_id".to_string(), self.tenant_id.to_string()),
            ("payer_id".to_string(), payer_id.to_string()),
        ]);

        let request = CreateIntentRequest {
            amount_cents: input.amount_cents,
            currency: currency.clone(),
            description: description.clone(),
            customer_id,
            save_for_off_session: true,
            metadata: metadata.clone(),
        };

        let created = match api.create_payment_intent(&request).await {
            Ok(created) => created,
            Err(e) => {
                return Err(capture_provider_failure(
                    self.ports.audit.as_ref(),
                    self.tenant_id,
                    Some(payer_id),
                    ProviderKind::Gateway,
                    AuditAction::CreatePaymentIntent,
                    &e,
                )
                .await);
            }
        };

        let stored = self
            .ports
            .intents
            .create(&NewPaymentIntent {
                tenant_id: self.tenant_id,
                payer_id,
                external_id: created.external_id.clone(),
                amount_cents: input.amount_cents,
                currency,
                description,
                metadata: serde_json::to_value(&metadata).unwrap_or(JsonValue::Null),
            })
            .await;

        // The gateway already holds the intent; the audit entry is the only record of it.
        let intent = match stored {
            Ok(intent) => intent,
            Err(e) => {
                let orphaned = AppError::Internal(format!(
                    "Gateway intent {} was created but could not be stored: {e}",
                    created.external_id
                ));
                return Err(capture_provider_failure(
                    self.ports.audit.as_ref(),
                    self.tenant_id,
                    Some(payer_id),
                    ProviderKind::Gateway,
                    AuditAction::CreatePaymentIntent,
                    &orphaned,
                )
                .await);
            }
        };

        tracing::info!(
            tenant_id = %self.tenant_id,
            payer_id = %payer_id,
            external_id = %intent.external_id,
            amount_cents = intent.amount_cents,
            "Created gateway payment intent"
        );

        Ok(PaymentIntentCreated {
            payment_intent_id: intent.id,
            external_id: intent.external_id,
            client_secret: created.client_secret,
            publishable_key: self.publishable_key.clone(),
            status: intent.status,
        })
    }

    /// Verify, parse and apply a raw webhook delivery.
    ///
    /// Deliveries without a signature are only accepted when no signing secret is
    /// configured and `allow_unsigned` is set.
    pub async fn handle_webhook(
        &self,
        raw_body: &str,
        signature_header: Option<&str>,
        allow_unsigned: bool,
    ) -> AppResult<WebhookHandling> {
        match (&self.webhook_secret, signature_header) {
            (Some(secret), Some(header)) => {
                verify_webhook_signature(raw_body, header, secret.expose_secret())?
            }
            (Some(_), None) => return Err(AppError::InvalidSignature),
            (None, _) if allow_unsigned => {
                tracing::warn!(
                    tenant_id = %self.tenant_id,
                    "Accepting unsigned gateway webhook: no signing secret configured"
                );
            }
            (None, _) => return Err(AppError::InvalidSignature),
        }

        let payload: JsonValue = serde_json::from_str(raw_body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {e}")))?;
        let event: GatewayWebhookEvent = serde_json::from_value(payload.clone())
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook event: {e}")))?;

        self.process_event(&event, payload, raw_body.to_string()).await
    }

    /// Apply an already verified event. Safe to call any number of times per event.
    pub async fn process_event(
        &self,
        event: &GatewayWebhookEvent,
        payload: JsonValue,
        payload_raw: String,
    ) -> AppResult<WebhookHandling> {
        let transition = event.transition();
        let record = NewWebhookEvent {
            tenant_id: self.tenant_id,
            external_id: event.id.clone(),
            event_type: event.event_type.clone(),
            payload,
            payload_raw,
        };

        let outcome = self
            .ports
            .webhooks
            .apply_once(&record, &transition, Utc::now())
            .await?;

        let (intent, ledger_entry) = match outcome {
            WebhookApplyOutcome::Duplicate => {
                tracing::info!(
                    tenant_id = %self.tenant_id,
                    event_id = %event.id,
                    "Gateway event already processed"
                );
                return Ok(WebhookHandling::Duplicate);
            }
            WebhookApplyOutcome::Applied {
                intent,
                ledger_entry,
            } => (intent, ledger_entry),
        };

        match &transition {
            WebhookTransition::Ignore { reason } => {
                tracing::info!(
                    tenant_id = %self.tenant_id,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "Ignoring gateway event"
                );
                return Ok(WebhookHandling::Ignored);
            }
            WebhookTransition::IntentSucceeded { external_id }
            | WebhookTransition::IntentFailed { external_id, .. }
                if intent.is_none() =>
            {
                tracing::warn!(
                    tenant_id = %self.tenant_id,
                    event_id = %event.id,
                    external_id = %external_id,
                    "Gateway event for unknown or already settled intent, acknowledging"
                );
                return Ok(WebhookHandling::Ignored);
            }
            _ => {}
        }

        tracing::info!(
            tenant_id = %self.tenant_id,
            event_id = %event.id,
            event_type = %event.event_type,
            "Applied gateway event"
        );

        if let (Some(entry), Some(intent)) = (ledger_entry, intent) {
            let job = LedgerExportJob { entry, intent };
            if let Err(e) = self.ports.ledger.export(&job).await {
                // The entry stays claimable; the retry sweep picks it up.
                tracing::error!(
                    tenant_id = %self.tenant_id,
                    ledger_entry_id = %job.entry.id,
                    error = %e,
                    "Ledger export bookkeeping failed"
                );
            }
        }

        Ok(WebhookHandling::Processed)
    }
}
