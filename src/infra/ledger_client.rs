use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value as JsonValue, json};
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::ledger::{AccountingRecord, LedgerExporter},
};

/// Posts accounting records as JSON to the external ledger service.
pub struct HttpLedgerExporter {
    client: Client,
    url: Url,
    token: Option<SecretString>,
}

impl HttpLedgerExporter {
    pub fn new(client: Client, url: Url, token: Option<SecretString>) -> Self {
        Self { client, url, token }
    }
}

/// Non-JSON acknowledgements are kept verbatim.
fn parse_body(body: &str) -> JsonValue {
    if body.trim().is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| json!({ "raw": body }))
}

#[async_trait]
impl LedgerExporter for HttpLedgerExporter {
    async fn submit(&self, record: &AccountingRecord) -> AppResult<JsonValue> {
        let mut request = self.client.post(self.url.clone()).json(record);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Ledger request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read ledger response: {}", e)))?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                booking_id = %record.booking_id,
                "Ledger service rejected record"
            );
            return Err(AppError::Internal(format!(
                "Ledger service returned {}: {}",
                status, body
            )));
        }

        Ok(parse_body(&body))
    }
}
