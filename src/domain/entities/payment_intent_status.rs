use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle of a gateway payment intent.
///
/// Intents start as `RequiresAction` at checkout and only move forward through webhook
/// processing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "payment_intent_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresAction,
    Succeeded,
    Failed,
}

impl PaymentIntentStatus {
    /// Whether a `payment_intent.succeeded` event may move the intent to `Succeeded`.
    pub fn can_succeed(&self) -> bool {
        !matches!(self, PaymentIntentStatus::Succeeded)
    }

    /// Whether a `payment_intent.payment_failed` event may move the intent to `Failed`.
    /// A settled payment is never reopened by a late failure notification.
    pub fn can_fail(&self) -> bool {
        matches!(self, PaymentIntentStatus::RequiresAction)
    }
}
