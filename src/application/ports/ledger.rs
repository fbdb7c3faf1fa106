use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::app_error::AppResult;

/// Double-entry booking submitted to the external accounting system.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountingRecord {
    /// Stable per payment, so the accounting side can spot resubmissions.
    pub booking_id: String,
    pub debit_account: String,
    pub credit_account: String,
    pub amount_cents: i64,
    pub amount: String,
    pub currency: String,
    pub memo: String,
    pub booked_at: DateTime<Utc>,
}

#[async_trait]
pub trait LedgerExporter: Send + Sync {
    /// Submit one record and return the accounting system's response body.
    async fn submit(&self, record: &AccountingRecord) -> AppResult<JsonValue>;
}
