use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::directory::{
        ActiveContract, BillingReader, PayerDirectory, PostalAddress, TenantDirectory,
    },
    domain::{
        entities::{
            mandate_status::MandateStatus, payment_method::PaymentMethodKind,
            provider_kind::ProviderKind,
        },
        iban::{self, GermanIban},
        money::format_cents,
    },
};

use super::audit::{AuditAction, AuditStatus, NewAuditEntry, ProviderAuditLogRepo, record_entry};

pub const SETTLEMENT_CURRENCY: &str = "EUR";
const BATCH_DELIMITER: char = ';';
const BYTE_ORDER_MARK: &str = "\u{FEFF}";
const PURPOSE_PREFIX: &str = "Mitgliedsbeitrag";
const BATCH_HEADER: [&str; 10] = [
    "mandate_reference",
    "iban",
    "bic",
    "payer_name",
    "amount",
    "currency",
    "purpose",
    "mandate_date",
    "payer_id",
    "plan_name",
];

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SepaMandateProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub payer_id: Uuid,
    pub iban: String,
    pub bic: Option<String>,
    pub payer_name: String,
    pub bank_name: Option<String>,
    pub mandate_reference: String,
    pub creditor_id: String,
    pub status: MandateStatus,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewSepaMandate {
    pub tenant_id: Uuid,
    pub payer_id: Uuid,
    pub iban: String,
    pub bic: Option<String>,
    pub payer_name: String,
    pub bank_name: Option<String>,
    pub mandate_reference: String,
    pub creditor_id: String,
}

/// Result of replacing a payer's active mandate.
#[derive(Debug, Clone)]
pub struct MandateReplacement {
    pub mandate: SepaMandateProfile,
    pub superseded: Option<SepaMandateProfile>,
}

#[async_trait]
pub trait SepaMandateRepo: Send + Sync {
    /// In one transaction: revoke the payer's active mandate (if any), insert `mandate` as
    /// active, and store it as the payer's `sepa_debit` payment method.
    async fn replace_active(
        &self,
        mandate: &NewSepaMandate,
        now: DateTime<Utc>,
    ) -> AppResult<MandateReplacement>;

    async fn get_active_for_payer(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
    ) -> AppResult<Option<SepaMandateProfile>>;

    /// Returns the revoked mandate, or `None` when the payer had no active one.
    async fn revoke_active(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<SepaMandateProfile>>;

    async fn list_active_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SepaMandateProfile>>;
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BankDetailsInput {
    pub iban: String,
    pub bic: Option<String>,
    pub account_holder: Option<String>,
    pub bank_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MandateDocument {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFile {
    pub file_name: String,
    pub row_count: usize,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementPreviewItem {
    pub payer_id: Uuid,
    pub payer_name: String,
    pub plan_name: String,
    pub mandate_reference: String,
    pub iban_masked: String,
    pub bic: Option<String>,
    pub bank_name: Option<String>,
    pub recurring_fee_cents: i64,
    pub open_invoices_cents: i64,
    pub amount_cents: i64,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementPreview {
    pub currency: &'static str,
    pub item_count: usize,
    pub total_cents: i64,
    pub total: String,
    pub primary_bank: Option<String>,
    pub items: Vec<SettlementPreviewItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingMandate {
    pub payer_id: Uuid,
    pub payer_name: String,
    pub plan_name: String,
    pub payment_method: PaymentMethodKind,
}

// ============================================================================
// Provider
// ============================================================================

/// Collaborators of the manual provider, shared by every tenant-bound instance.
#[derive(Clone)]
pub struct ManualSettlementPorts {
    pub mandates: Arc<dyn SepaMandateRepo>,
    pub payers: Arc<dyn PayerDirectory>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub billing: Arc<dyn BillingReader>,
    pub audit: Arc<dyn ProviderAuditLogRepo>,
}

/// SEPA direct debit settlement for one tenant.
///
/// Mandates are collected here and exported as a batch file; the studio submits the batch
/// through its own bank, so nothing in this provider talks to a payment network.
#[derive(Clone)]
pub struct ManualSettlementProvider {
    tenant_id: Uuid,
    creditor_id: Option<String>,
    ports: ManualSettlementPorts,
}

impl ManualSettlementProvider {
    pub fn new(tenant_id: Uuid, creditor_id: Option<String>, ports: ManualSettlementPorts) -> Self {
        Self {
            tenant_id,
            creditor_id,
            ports,
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn creditor_id(&self) -> Option<&str> {
        self.creditor_id.as_deref()
    }

    pub async fn create_mandate(
        &self,
        payer_id: Uuid,
        details: BankDetailsInput,
    ) -> AppResult<SepaMandateProfile> {
        let valid_iban = iban::validate_german_iban(&details.iban)?;
        let bic = non_empty(details.bic.as_deref())
            .map(iban::validate_bic)
            .transpose()?;

        let creditor_id = self
            .creditor_id
            .clone()
            .ok_or_else(|| AppError::NotConfigured("SEPA creditor id".into()))?;

        let payer = self
            .ports
            .payers
            .get_payer(self.tenant_id, payer_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let payer_name = non_empty(details.account_holder.as_deref())
            .map(str::to_string)
            .or_else(|| non_empty(Some(payer.display_name.as_str())).map(str::to_string))
            .ok_or_else(|| AppError::Validation("Account holder name is required".into()))?;

        let lookup = iban::bank_lookup(valid_iban.bank_code());
        let bic = bic.or(lookup.bic);
        let bank_name = non_empty(details.bank_name.as_deref())
            .map(str::to_string)
            .or(lookup.bank_name);

        let now = Utc::now();
        let new_mandate = NewSepaMandate {
            tenant_id: self.tenant_id,
            payer_id,
            iban: valid_iban.into_string(),
            bic,
            payer_name,
            bank_name,
            mandate_reference: mandate_reference(payer_id, now, &reference_suffix()),
            creditor_id,
        };

        let replacement = self.ports.mandates.replace_active(&new_mandate, now).await?;

        if let Some(ref old) = replacement.superseded {
            tracing::info!(
                tenant_id = %self.tenant_id,
                payer_id = %payer_id,
                superseded = %old.mandate_reference,
                "Revoked previous mandate in favour of new one"
            );
        }

        record_entry(
            self.ports.audit.as_ref(),
            NewAuditEntry {
                tenant_id: self.tenant_id,
                payer_id: Some(payer_id),
                provider: ProviderKind::Manual,
                action: AuditAction::CreateMandate,
                status: AuditStatus::Success,
                message: format!(
                    "Mandate {} created for IBAN {}",
                    replacement.mandate.mandate_reference,
                    iban::mask_iban(&replacement.mandate.iban)
                ),
            },
        )
        .await;

        Ok(replacement.mandate)
    }

    pub async fn revoke_mandate(&self, payer_id: Uuid) -> AppResult<SepaMandateProfile> {
        let revoked = self
            .ports
            .mandates
            .revoke_active(self.tenant_id, payer_id, Utc::now())
            .await?
            .ok_or(AppError::NotFound)?;

        record_entry(
            self.ports.audit.as_ref(),
            NewAuditEntry {
                tenant_id: self.tenant_id,
                payer_id: Some(payer_id),
                provider: ProviderKind::Manual,
                action: AuditAction::RevokeMandate,
                status: AuditStatus::Success,
                message: format!("Mandate {} revoked", revoked.mandate_reference),
            },
        )
        .await;

        Ok(revoked)
    }

    /// Printable mandate form for the payer's active mandate.
    pub async fn generate_mandate_document(&self, payer_id: Uuid) -> AppResult<MandateDocument> {
        let mandate = self
            .ports
            .mandates
            .get_active_for_payer(self.tenant_id, payer_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let tenant = self
            .ports
            .tenants
            .get_tenant(self.tenant_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let payer_address = self
            .ports
            .payers
            .get_payer(self.tenant_id, payer_id)
            .await?
            .map(|p| p.address)
            .unwrap_or_default();

        let content = render_mandate_document(
            &tenant.name,
            &tenant.address,
            &mandate,
            &payer_address,
        );

        Ok(MandateDocument {
            file_name: format!("{}.txt", mandate.mandate_reference),
            content,
        })
    }

    /// Delimited export of every active mandate, for upload into the studio's banking software.
    ///
    /// Amounts are left blank: the banking software fills them from the contract run.
    pub async fn generate_batch_file(&self) -> AppResult<BatchFile> {
        let mandates = self
            .ports
            .mandates
            .list_active_by_tenant(self.tenant_id)
            .await?;
        if mandates.is_empty() {
            return Err(AppError::EmptyBatch);
        }

        let contracts = self
            .ports
            .billing
            .list_active_contracts(self.tenant_id)
            .await?;
        let plans = plan_names_by_payer(contracts.iter());

        let mut content = String::from(BYTE_ORDER_MARK);
        push_row(&mut content, BATCH_HEADER.iter().copied());

        for mandate in &mandates {
            let plan_name = plans.get(&mandate.payer_id).cloned().unwrap_or_default();
            let purpose = if plan_name.is_empty() {
                PURPOSE_PREFIX.to_string()
            } else {
                format!("{PURPOSE_PREFIX} {plan_name}")
            };
            let mandate_date = mandate.created_at.format("%Y-%m-%d").to_string();
            let payer_id = mandate.payer_id.to_string();

            push_row(
                &mut content,
                [
                    mandate.mandate_reference.as_str(),
                    mandate.iban.as_str(),
                    mandate.bic.as_deref().unwrap_or(""),
                    mandate.payer_name.as_str(),
                    "",
                    SETTLEMENT_CURRENCY,
                    purpose.as_str(),
                    mandate_date.as_str(),
                    payer_id.as_str(),
                    plan_name.as_str(),
                ],
            );
        }

        tracing::info!(
            tenant_id = %self.tenant_id,
            rows = mandates.len(),
            "Generated SEPA batch file"
        );

        Ok(BatchFile {
            file_name: format!("sepa-batch-{}.csv", Utc::now().format("%Y%m%d-%H%M%S")),
            row_count: mandates.len(),
            content,
        })
    }

    /// What the next debit run would collect, per payer.
    pub async fn preview_settlement_run(&self) -> AppResult<SettlementPreview> {
        let contracts = self
            .ports
            .billing
            .list_active_contracts(self.tenant_id)
            .await?;
        let balances = self
            .ports
            .billing
            .open_invoice_balances(self.tenant_id)
            .await?;
        let mandates: HashMap<Uuid, SepaMandateProfile> = self
            .ports
            .mandates
            .list_active_by_tenant(self.tenant_id)
            .await?
            .into_iter()
            .map(|m| (m.payer_id, m))
            .collect();

        let eligible = contracts
            .iter()
            .filter(|c| c.payment_method.is_debit() && mandates.contains_key(&c.payer_id));

        let mut items = Vec::new();
        for (payer_id, payer_contracts) in group_by_payer(eligible) {
            let Some(mandate) = mandates.get(&payer_id) else {
                continue;
            };
            let recurring_fee_cents: i64 = payer_contracts.iter().map(|c| c.monthly_fee_cents).sum();
            let open_invoices_cents = balances.get(&payer_id).copied().unwrap_or(0).max(0);
            let amount_cents = recurring_fee_cents + open_invoices_cents;

            items.push(SettlementPreviewItem {
                payer_id,
                payer_name: payer_contracts[0].payer_name.clone(),
                plan_name: join_plan_names(payer_contracts.iter().copied()),
                mandate_reference: mandate.mandate_reference.clone(),
                iban_masked: iban::mask_iban(&mandate.iban),
                bic: mandate.bic.clone(),
                bank_name: mandate.bank_name.clone(),
                recurring_fee_cents,
                open_invoices_cents,
                amount_cents,
                amount: format_cents(amount_cents),
            });
        }

        let total_cents: i64 = items.iter().map(|i| i.amount_cents).sum();
        let primary_bank = primary_bank(items.iter().filter_map(|i| i.bank_name.as_deref()));

        Ok(SettlementPreview {
            currency: SETTLEMENT_CURRENCY,
            item_count: items.len(),
            total_cents,
            total: format_cents(total_cents),
            primary_bank,
            items,
        })
    }

    /// Payers expected to pay by debit who have no active mandate to debit against.
    pub async fn run_missing_mandate_diagnostic(&self) -> AppResult<Vec<MissingMandate>> {
        let contracts = self
            .ports
            .billing
            .list_active_contracts(self.tenant_id)
            .await?;
        let covered: HashSet<Uuid> = self
            .ports
            .mandates
            .list_active_by_tenant(self.tenant_id)
            .await?
            .into_iter()
            .map(|m| m.payer_id)
            .collect();

        let uncovered = contracts
            .iter()
            .filter(|c| c.payment_method.is_debit() && !covered.contains(&c.payer_id));

        let missing: Vec<MissingMandate> = group_by_payer(uncovered)
            .into_iter()
            .map(|(payer_id, payer_contracts)| MissingMandate {
                payer_id,
                payer_name: payer_contracts[0].payer_name.clone(),
                plan_name: join_plan_names(payer_contracts.iter().copied()),
                payment_method: payer_contracts[0].payment_method,
            })
            .collect();

        if !missing.is_empty() {
            tracing::warn!(
                tenant_id = %self.tenant_id,
                count = missing.len(),
                "Debit payers without an active mandate"
            );
        }

        Ok(missing)
    }
}

// ============================================================================
// Helpers
// ============================================================================

const REFERENCE_SUFFIX_LEN: usize = 4;

/// `SEPA-<first 8 hex chars of the payer id>-<unix millis>-<suffix>`, at most 35 characters.
pub fn mandate_reference(payer_id: Uuid, now: DateTime<Utc>, suffix: &str) -> String {
    let simple = payer_id.simple().to_string().to_uppercase();
    format!("SEPA-{}-{}-{}", &simple[..8], now.timestamp_millis(), suffix)
}

/// Random uppercase alphanumerics; keeps references distinct within one millisecond.
fn reference_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// Most common bank among the given names. Ties are listed alphabetically, joined by ` / `.
pub fn primary_bank<'a>(bank_names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in bank_names {
        let name = name.trim();
        if !name.is_empty() {
            *counts.entry(name).or_default() += 1;
        }
    }

    let max = counts.values().copied().max()?;
    let leaders: Vec<&str> = counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(name, _)| *name)
        .collect();
    Some(leaders.join(" / "))
}

/// Groups contracts by payer, keeping first-seen payer order.
fn group_by_payer<'a>(
    contracts: impl Iterator<Item = &'a ActiveContract>,
) -> Vec<(Uuid, Vec<&'a ActiveContract>)> {
    let mut groups: Vec<(Uuid, Vec<&'a ActiveContract>)> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for contract in contracts {
        match index.get(&contract.payer_id) {
            Some(&i) => groups[i].1.push(contract),
            None => {
                index.insert(contract.payer_id, groups.len());
                groups.push((contract.payer_id, vec![contract]));
            }
        }
    }
    groups
}

fn join_plan_names<'a>(contracts: impl Iterator<Item = &'a ActiveContract>) -> String {
    let mut names: Vec<&str> = Vec::new();
    for contract in contracts {
        if !names.contains(&contract.plan_name.as_str()) {
            names.push(&contract.plan_name);
        }
    }
    names.join(", ")
}

fn plan_names_by_payer<'a>(
    contracts: impl Iterator<Item = &'a ActiveContract>,
) -> HashMap<Uuid, String> {
    group_by_payer(contracts)
        .into_iter()
        .map(|(payer_id, group)| (payer_id, join_plan_names(group.into_iter())))
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let row = fields
        .into_iter()
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(&BATCH_DELIMITER.to_string());
    out.push_str(&row);
    out.push_str("\r\n");
}

/// Quote cells containing the delimiter, quotes or line breaks, and neutralize leading
/// characters spreadsheets treat as formulas.
pub fn escape_field(field: &str) -> String {
    let needs_quoting = field.contains(BATCH_DELIMITER)
        || field.contains('"')
        || field.contains('\n')
        || field.contains('\r');

    let is_formula = field
        .chars()
        .next()
        .map(|c| matches!(c, '=' | '+' | '-' | '@' | '\t' | '\r'))
        .unwrap_or(false);

    let escaped = if is_formula {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if needs_quoting || is_formula {
        format!("\"{}\"", escaped.replace('"', "\"\""))
    } else {
        escaped
    }
}

fn render_mandate_document(
    creditor_name: &str,
    creditor_address: &PostalAddress,
    mandate: &SepaMandateProfile,
    payer_address: &PostalAddress,
) -> String {
    let iban = iban::validate_german_iban(&mandate.iban)
        .map(|i| GermanIban::formatted(&i))
        .unwrap_or_else(|_| mandate.iban.clone());
    let bic = mandate.bic.as_deref().unwrap_or("-");
    let bank = mandate.bank_name.as_deref().unwrap_or("-");
    let signed_on = mandate.created_at.format("%d.%m.%Y");

    format!(
        "SEPA-Lastschriftmandat / SEPA Direct Debit Mandate\n\
         \n\
         Zahlungsempfänger / Creditor\n\
         Name:              {creditor_name}\n\
         Anschrift:         {creditor_address}\n\
         Gläubiger-ID:      {creditor_id}\n\
         Mandatsreferenz:   {reference}\n\
         \n\
         Ich ermächtige {creditor_name}, Zahlungen von meinem Konto mittels Lastschrift \
         einzuziehen. Zugleich weise ich mein Kreditinstitut an, die von {creditor_name} auf \
         mein Konto gezogenen Lastschriften einzulösen.\n\
         Hinweis: Ich kann innerhalb von acht Wochen, beginnend mit dem Belastungsdatum, die \
         Erstattung des belasteten Betrages verlangen. Es gelten dabei die mit meinem \
         Kreditinstitut vereinbarten Bedingungen.\n\
         \n\
         Zahlungspflichtiger / Debtor\n\
         Name:              {payer_name}\n\
         Anschrift:         {payer_address}\n\
         IBAN:              {iban}\n\
         BIC:               {bic}\n\
         Kreditinstitut:    {bank}\n\
         \n\
         Datum / Date:      {signed_on}\n\
         Unterschrift / Signature: ______________________________\n",
        creditor_address = creditor_address.one_line(),
        creditor_id = mandate.creditor_id,
        reference = mandate.mandate_reference,
        payer_name = mandate.payer_name,
        payer_address = payer_address.one_line(),
    )
}
