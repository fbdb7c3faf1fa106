pub mod audit;
pub mod entitlement;
pub mod gateway_settlement;
pub mod ledger_export;
pub mod manual_settlement;
pub mod provider_registry;
