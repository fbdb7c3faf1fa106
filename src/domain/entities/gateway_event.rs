/// Gateway webhook event types the settlement engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    PaymentSucceeded,
    PaymentFailed,
    SetupSucceeded,
    Other(String),
}

impl GatewayEventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => Self::PaymentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentFailed,
            "setup_intent.succeeded" => Self::SetupSucceeded,
            other => Self::Other(other.to_string()),
        }
    }
}
