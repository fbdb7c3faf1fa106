//! Read ports onto data owned by other studio subsystems.
//!
//! Member, tenant, contract and invoice records are maintained elsewhere. Settlement only
//! reads them, always scoped by tenant.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::{app_error::AppResult, domain::entities::payment_method::PaymentMethodKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostalAddress {
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

impl PostalAddress {
    /// Single-line form, skipping missing parts.
    pub fn one_line(&self) -> String {
        let locality = [self.postal_code.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        [self.street.as_deref(), Some(locality.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PayerProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub address: PostalAddress,
    pub payment_method: Option<PaymentMethodKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantProfile {
    pub id: Uuid,
    pub name: String,
    pub address: PostalAddress,
}

/// An active membership contract with the payer's settlement method.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveContract {
    pub contract_id: Uuid,
    pub payer_id: Uuid,
    pub payer_name: String,
    pub plan_name: String,
    pub monthly_fee_cents: i64,
    pub payment_method: PaymentMethodKind,
}

#[async_trait]
pub trait PayerDirectory: Send + Sync {
    async fn get_payer(&self, tenant_id: Uuid, payer_id: Uuid) -> AppResult<Option<PayerProfile>>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn get_tenant(&self, tenant_id: Uuid) -> AppResult<Option<TenantProfile>>;
}

#[async_trait]
pub trait BillingReader: Send + Sync {
    async fn list_active_contracts(&self, tenant_id: Uuid) -> AppResult<Vec<ActiveContract>>;

    /// Sum of open, partially paid and overdue invoice balances, keyed by payer.
    async fn open_invoice_balances(&self, tenant_id: Uuid) -> AppResult<HashMap<Uuid, i64>>;
}
