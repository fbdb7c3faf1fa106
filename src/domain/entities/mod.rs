pub mod access;
pub mod addon_status;
pub mod gateway_event;
pub mod gateway_mode;
pub mod ledger_export_status;
pub mod mandate_status;
pub mod payment_intent_status;
pub mod payment_method;
pub mod provider_kind;
pub mod trial_status;
