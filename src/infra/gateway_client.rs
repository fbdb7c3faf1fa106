use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::gateway::{CreateIntentRequest, CreatedIntent, GatewayApi},
};

pub const DEFAULT_GATEWAY_API_BASE: &str = "https://api.stripe.com/v1";

/// Header carrying `t=<unix seconds>,v1=<hex hmac>[,v1=...]`.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed delivery, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Client for the hosted payment gateway's REST API (Stripe-compatible).
pub struct GatewayClient {
    client: Client,
    api_base: String,
    secret_key: SecretString,
}

impl GatewayClient {
    pub fn new(client: Client, api_base: String, secret_key: SecretString) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn auth_header(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read gateway response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Gateway API error");

            if let Ok(error) = serde_json::from_str::<GatewayErrorResponse>(&body) {
                return Err(AppError::InvalidInput(format!(
                    "Gateway error: {}",
                    error.error.message.unwrap_or(error.error.error_type)
                )));
            }

            return Err(AppError::Internal(format!(
                "Gateway API error: {} - {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse gateway response");
            AppError::Internal(format!("Failed to parse gateway response: {}", e))
        })
    }
}

/// Form parameters for `POST /payment_intents`.
fn intent_params(request: &CreateIntentRequest) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("amount".to_string(), request.amount_cents.to_string()),
        ("currency".to_string(), request.currency.to_lowercase()),
        ("description".to_string(), request.description.clone()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    if let Some(customer) = &request.customer_id {
        params.push(("customer".to_string(), customer.clone()));
    }
    if request.save_for_off_session {
        params.push(("setup_future_usage".to_string(), "off_session".to_string()));
    }

    let mut metadata: Vec<_> = request.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
    }
    params
}

#[async_trait]
impl GatewayApi for GatewayClient {
    async fn create_payment_intent(&self, request: &CreateIntentRequest) -> AppResult<CreatedIntent> {
        let response = self
            .client
            .post(format!("{}/payment_intents", self.api_base))
            .header("Authorization", self.auth_header())
            .form(&intent_params(request))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Gateway request failed: {}", e)))?;

        let intent: GatewayPaymentIntent = self.handle_response(response).await?;
        Ok(CreatedIntent {
            external_id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
        })
    }
}

// ============================================================================
// Webhook Signature Verification
// ============================================================================

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(payload: &str, timestamp: i64, secret: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signed delivery. Every failure is reported as `InvalidSignature`.
pub fn verify_webhook_signature(
    payload: &str,
    signature_header: &str,
    webhook_secret: &str,
) -> AppResult<()> {
    verify_webhook_signature_at(payload, signature_header, webhook_secret, chrono::Utc::now().timestamp())
}

fn verify_webhook_signature_at(
    payload: &str,
    signature_header: &str,
    webhook_secret: &str,
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp: i64 = timestamp
        .and_then(|t| t.parse().ok())
        .ok_or(AppError::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(AppError::InvalidSignature);
    }

    let expected = compute_signature(payload, timestamp, webhook_secret);
    if !signatures.iter().any(|sig| constant_time_compare(sig, &expected)) {
        tracing::warn!("Gateway webhook signature mismatch");
        return Err(AppError::InvalidSignature);
    }

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!(timestamp, now, "Gateway webhook timestamp outside tolerance");
        return Err(AppError::InvalidSignature);
    }

    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// Gateway Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GatewayPaymentIntent {
    id: String,
    client_secret: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorResponse {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: Option<String>,
}
