use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// How a payer settles their recurring fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethodKind {
    SepaDebit,
    Card,
    BankTransfer,
    Cash,
    Other,
}

impl PaymentMethodKind {
    /// Parse the free-form method labels used by the member directory.
    ///
    /// Unknown labels map to `Other` instead of failing, since the directory is not ours.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "sepa" | "sepa_debit" | "sepa_direct_debit" | "direct_debit" | "debit"
            | "lastschrift" => PaymentMethodKind::SepaDebit,
            "card" | "credit_card" | "gateway" => PaymentMethodKind::Card,
            "bank_transfer" | "transfer" | "ueberweisung" => PaymentMethodKind::BankTransfer,
            "cash" | "bar" => PaymentMethodKind::Cash,
            _ => PaymentMethodKind::Other,
        }
    }

    /// Whether settlement happens by pulling funds from the payer's account.
    pub fn is_debit(&self) -> bool {
        matches!(self, PaymentMethodKind::SepaDebit)
    }
}
