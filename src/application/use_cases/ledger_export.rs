use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::ledger::{AccountingRecord, LedgerExporter},
    domain::{
        entities::{ledger_export_status::LedgerExportStatus, provider_kind::ProviderKind},
        money::format_cents,
    },
};

use super::{
    audit::{AuditAction, AuditStatus, NewAuditEntry, ProviderAuditLogRepo, record_entry},
    gateway_settlement::PaymentIntentProfile,
};

/// Entries that failed this many times stay `failed` and are no longer retried.
pub const MAX_EXPORT_ATTEMPTS: i32 = 8;
/// A claim older than this is assumed to belong to a crashed worker.
pub const STALE_LOCK_THRESHOLD_SECS: i64 = 300;
pub const DEFAULT_RETRY_BATCH_SIZE: i64 = 50;
const MAX_ERROR_LEN: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct LedgerExportProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub payment_intent_id: Uuid,
    pub status: LedgerExportStatus,
    pub response_payload: Option<JsonValue>,
    pub error_message: Option<String>,
    pub attempt_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A claimed entry together with the payment it books.
#[derive(Debug, Clone)]
pub struct LedgerExportJob {
    pub entry: LedgerExportProfile,
    pub intent: PaymentIntentProfile,
}

#[async_trait]
pub trait LedgerExportRepo: Send + Sync {
    /// Lock up to `limit` due entries (pending or failed, below `max_attempts`, not locked
    /// since `stale_before`) and return them with their intents.
    async fn claim_due(
        &self,
        limit: i64,
        max_attempts: i32,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> AppResult<Vec<LedgerExportJob>>;

    async fn mark_success(&self, id: Uuid, response: &JsonValue, now: DateTime<Utc>) -> AppResult<()>;

    /// Record a failed attempt and release the lock. `next_attempt_at = None` stops retries.
    async fn mark_failed(
        &self,
        id: Uuid,
        attempt_count: i32,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct LedgerAccounts {
    pub debit_account: String,
    pub credit_account: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerRetrySummary {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct LedgerExportUseCases {
    repo: Arc<dyn LedgerExportRepo>,
    exporter: Arc<dyn LedgerExporter>,
    audit: Arc<dyn ProviderAuditLogRepo>,
    accounts: LedgerAccounts,
}

impl LedgerExportUseCases {
    pub fn new(
        repo: Arc<dyn LedgerExportRepo>,
        exporter: Arc<dyn LedgerExporter>,
        audit: Arc<dyn ProviderAuditLogRepo>,
        accounts: LedgerAccounts,
    ) -> Self {
        Self {
            repo,
            exporter,
            audit,
            accounts,
        }
    }

    pub fn build_record(&self, intent: &PaymentIntentProfile, now: DateTime<Utc>) -> AccountingRecord {
        AccountingRecord {
            booking_id: format!("GW-{}", intent.external_id),
            debit_account: self.accounts.debit_account.clone(),
            credit_account: self.accounts.credit_account.clone(),
            amount_cents: intent.amount_cents,
            amount: format_cents(intent.amount_cents),
            currency: intent.currency.clone(),
            memo: format!("{} (payer {})", intent.description, intent.payer_id),
            booked_at: now,
        }
    }

    /// Submit one claimed entry and record the outcome on it.
    ///
    /// A failed submission is not an error here: it is stored on the entry and scheduled
    /// for another attempt. Errors only come from recording the outcome.
    pub async fn export(&self, job: &LedgerExportJob) -> AppResult<LedgerExportStatus> {
        let now = Utc::now();
        let record = self.build_record(&job.intent, now);

        match self.exporter.submit(&record).await {
            Ok(response) => {
                self.repo.mark_success(job.entry.id, &response, now).await?;
                tracing::info!(
                    tenant_id = %job.entry.tenant_id,
                    ledger_entry_id = %job.entry.id,
                    booking_id = %record.booking_id,
                    "Exported payment to ledger"
                );
                Ok(LedgerExportStatus::Success)
            }
            Err(e) => {
                let attempt_count = job.entry.attempt_count + 1;
                let next_attempt_at = (attempt_count < MAX_EXPORT_ATTEMPTS)
                    .then(|| now + Duration::seconds(calculate_backoff_delay(attempt_count - 1)));
                let error = truncate(&e.to_string(), MAX_ERROR_LEN);

                self.repo
                    .mark_failed(job.entry.id, attempt_count, &error, next_attempt_at)
                    .await?;

                tracing::warn!(
                    tenant_id = %job.entry.tenant_id,
                    ledger_entry_id = %job.entry.id,
                    attempt = attempt_count,
                    next_attempt_at = ?next_attempt_at,
                    error = %error,
                    "Ledger export failed"
                );

                record_entry(
                    self.audit.as_ref(),
                    NewAuditEntry {
                        tenant_id: job.entry.tenant_id,
                        payer_id: Some(job.intent.payer_id),
                        provider: ProviderKind::Gateway,
                        action: AuditAction::ExportLedger,
                        status: AuditStatus::Failure,
                        message: format!("Ledger export attempt {attempt_count} failed: {error}"),
                    },
                )
                .await;

                Ok(LedgerExportStatus::Failed)
            }
        }
    }

    /// Re-export due entries. Safe to run concurrently; claims never overlap.
    pub async fn retry_due_exports(&self, batch_size: i64) -> AppResult<LedgerRetrySummary> {
        let now = Utc::now();
        let stale_before = now - Duration::seconds(STALE_LOCK_THRESHOLD_SECS);
        let jobs = self
            .repo
            .claim_due(batch_size.max(1), MAX_EXPORT_ATTEMPTS, now, stale_before)
            .await?;

        let mut summary = LedgerRetrySummary {
            claimed: jobs.len(),
            ..Default::default()
        };

        for job in &jobs {
            match self.export(job).await {
                Ok(LedgerExportStatus::Success) => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        ledger_entry_id = %job.entry.id,
                        error = %e,
                        "Failed to record ledger export outcome"
                    );
                }
            }
        }

        if summary.claimed > 0 {
            tracing::info!(
                claimed = summary.claimed,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Ledger export retry sweep finished"
            );
        }

        Ok(summary)
    }
}

/// Seconds until the next attempt: 5 minutes growing 4x per attempt, capped near 5.5 hours.
pub fn calculate_backoff_delay(attempt_count: i32) -> i64 {
    let base_delay: i64 = 300;
    let max_delay: i64 = 20_000;
    let exponential = base_delay.saturating_mul(4i64.saturating_pow(attempt_count.max(0) as u32));
    let capped = exponential.min(max_delay);
    let jitter = (rand::random::<u64>() % 60) as i64;
    capped + jitter
}

fn truncate(value: &str, max_len: usize) -> String {
    match value.char_indices().nth(max_len) {
        Some((index, _)) => value[..index].to_string(),
        None => value.to_string(),
    }
}
