use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Settlement provider a tenant collects payments through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "settlement_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum ProviderKind {
    /// SEPA direct debit, exported as a batch file and submitted by the studio's bank.
    #[default]
    Manual,
    /// Card and wallet payments through a hosted payment gateway.
    Gateway,
}

impl ProviderKind {
    /// Human-readable display name for the provider
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Manual => "SEPA Direct Debit",
            ProviderKind::Gateway => "Payment Gateway",
        }
    }

    /// Whether the provider needs API credentials before it can settle anything
    pub fn requires_credentials(&self) -> bool {
        matches!(self, ProviderKind::Gateway)
    }
}
