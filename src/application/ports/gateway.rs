use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{app_error::AppResult, domain::entities::gateway_event::GatewayEventKind};

// ============================================================================
// Port Types - Gateway-agnostic request/response shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    /// Gateway customer to attach the intent (and any saved instrument) to.
    pub customer_id: Option<String>,
    /// Ask the gateway to keep the instrument for later off-session charges.
    pub save_for_off_session: bool,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CreatedIntent {
    pub external_id: String,
    pub client_secret: Option<String>,
    pub status: String,
}

/// Outbound calls to the hosted payment gateway.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn create_payment_intent(&self, request: &CreateIntentRequest) -> AppResult<CreatedIntent>;
}

// ============================================================================
// Inbound webhook events
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayWebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayWebhookEventData {
    pub object: JsonValue,
}

/// State change a webhook event asks for, decided before touching storage.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookTransition {
    IntentSucceeded {
        external_id: String,
    },
    IntentFailed {
        external_id: String,
        failure_message: String,
    },
    InstrumentSaved {
        payer_id: Uuid,
        customer_id: Option<String>,
        instrument_ref: String,
    },
    Ignore {
        reason: String,
    },
}

const DEFAULT_FAILURE_MESSAGE: &str = "Payment failed";

impl GatewayWebhookEvent {
    pub fn kind(&self) -> GatewayEventKind {
        GatewayEventKind::parse(&self.event_type)
    }

    fn object_str(&self, field: &str) -> Option<&str> {
        self.data.object.get(field).and_then(JsonValue::as_str)
    }

    pub fn transition(&self) -> WebhookTransition {
        match self.kind() {
            GatewayEventKind::PaymentSucceeded => match self.object_str("id") {
                Some(id) => WebhookTransition::IntentSucceeded {
                    external_id: id.to_string(),
                },
                None => ignore("payment intent id missing"),
            },
            GatewayEventKind::PaymentFailed => match self.object_str("id") {
                Some(id) => {
                    let failure_message = self
                        .data
                        .object
                        .pointer("/last_payment_error/message")
                        .and_then(JsonValue::as_str)
                        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
                        .to_string();
                    WebhookTransition::IntentFailed {
                        external_id: id.to_string(),
                        failure_message,
                    }
                }
                None => ignore("payment intent id missing"),
            },
            GatewayEventKind::SetupSucceeded => {
                let payer_id = self
                    .data
                    .object
                    .pointer("/metadata/payer_id")
                    .and_then(JsonValue::as_str)
                    .and_then(|raw| Uuid::parse_str(raw).ok());
                let instrument_ref = self.object_str("payment_method");
                match (payer_id, instrument_ref) {
                    (Some(payer_id), Some(instrument_ref)) => WebhookTransition::InstrumentSaved {
                        payer_id,
                        customer_id: self.object_str("customer").map(str::to_string),
                        instrument_ref: instrument_ref.to_string(),
                    },
                    _ => ignore("setup intent lacks payer metadata or payment method"),
                }
            }
            GatewayEventKind::Other(event_type) => ignore(&format!("unhandled event type {event_type}")),
        }
    }
}

fn ignore(reason: &str) -> WebhookTransition {
    WebhookTransition::Ignore {
        reason: reason.to_string(),
    }
}
