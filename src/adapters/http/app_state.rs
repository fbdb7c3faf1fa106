use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        entitlement::EntitlementUseCases, ledger_export::LedgerExportUseCases,
        provider_registry::ProviderRegistry,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ProviderRegistry>,
    pub entitlements: Arc<EntitlementUseCases>,
    pub ledger_exports: Arc<LedgerExportUseCases>,
}
