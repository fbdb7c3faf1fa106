//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` wires an `AppState` from in-memory mocks. Handles to the
//! mocks are kept so tests can seed data before building and assert afterwards.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    infra::config::{AppConfig, AppEnvironment},
    use_cases::{
        entitlement::EntitlementUseCases,
        gateway_settlement::GatewaySettlementPorts,
        ledger_export::LedgerExportUseCases,
        provider_registry::{ProviderRegistry, RegistrySettings},
    },
};

use super::{
    InMemoryAuditLogRepo, InMemoryFeatureAddonRepo, InMemoryFeatureTrialRepo,
    InMemoryGatewayStore, InMemoryPaymentConfigRepo, InMemoryPlanCatalog, MockGatewayApi,
    MockLedgerExporter, test_cipher, test_ledger_accounts, test_manual_ports,
};

/// Builder for an `AppState` backed entirely by in-memory mocks.
///
/// # Example
///
/// ```ignore
/// let builder = TestAppStateBuilder::new().with_environment(AppEnvironment::Production);
/// let feature = builder.catalog().add_feature(create_test_feature(|_| {}));
/// let server = TestServer::new(build_router(builder.build())).unwrap();
/// ```
pub struct TestAppStateBuilder {
    environment: AppEnvironment,
    configs: Arc<InMemoryPaymentConfigRepo>,
    audit: Arc<InMemoryAuditLogRepo>,
    gateway_store: Arc<InMemoryGatewayStore>,
    gateway_api: Arc<MockGatewayApi>,
    exporter: Arc<MockLedgerExporter>,
    catalog: Arc<InMemoryPlanCatalog>,
    trials: Arc<InMemoryFeatureTrialRepo>,
    addons: Arc<InMemoryFeatureAddonRepo>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            environment: AppEnvironment::Development,
            configs: Arc::new(InMemoryPaymentConfigRepo::new()),
            audit: Arc::new(InMemoryAuditLogRepo::new()),
            gateway_store: Arc::new(InMemoryGatewayStore::new()),
            gateway_api: Arc::new(MockGatewayApi::new()),
            exporter: Arc::new(MockLedgerExporter::new()),
            catalog: Arc::new(InMemoryPlanCatalog::new()),
            trials: Arc::new(InMemoryFeatureTrialRepo::new()),
            addons: Arc::new(InMemoryFeatureAddonRepo::new()),
        }
    }

    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn configs(&self) -> Arc<InMemoryPaymentConfigRepo> {
        self.configs.clone()
    }

    pub fn audit(&self) -> Arc<InMemoryAuditLogRepo> {
        self.audit.clone()
    }

    pub fn gateway_store(&self) -> Arc<InMemoryGatewayStore> {
        self.gateway_store.clone()
    }

    pub fn catalog(&self) -> Arc<InMemoryPlanCatalog> {
        self.catalog.clone()
    }

    pub fn trials(&self) -> Arc<InMemoryFeatureTrialRepo> {
        self.trials.clone()
    }

    pub fn addons(&self) -> Arc<InMemoryFeatureAddonRepo> {
        self.addons.clone()
    }

    pub fn build(self) -> AppState {
        let ledger_exports = Arc::new(LedgerExportUseCases::new(
            self.gateway_store.clone(),
            self.exporter,
            self.audit.clone(),
            test_ledger_accounts(),
        ));

        let gateway_ports = GatewaySettlementPorts {
            intents: self.gateway_store.clone(),
            payment_methods: self.gateway_store.clone(),
            webhooks: self.gateway_store,
            ledger: ledger_exports.clone(),
            audit: self.audit.clone(),
        };

        let registry = ProviderRegistry::new(
            test_cipher(),
            self.configs,
            test_manual_ports(self.audit),
            gateway_ports,
            reqwest::Client::new(),
            RegistrySettings {
                gateway_api_base: "http://gateway.invalid/v1".to_string(),
                default_creditor_id: None,
            },
        )
        .with_gateway_override(self.gateway_api);

        let entitlements = EntitlementUseCases::new(self.catalog, self.trials, self.addons);

        let config = AppConfig {
            database_url: String::new(),
            bind_addr: "127.0.0.1:3002".parse::<SocketAddr>().unwrap(),
            environment: self.environment,
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            encryption_key: SecretString::new("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=".into()),
            gateway_api_base: "http://gateway.invalid/v1".to_string(),
            ledger_export_url: Url::parse("http://ledger.invalid/records").unwrap(),
            ledger_export_token: None,
            ledger_debit_account: "1200".to_string(),
            ledger_credit_account: "8400".to_string(),
            default_creditor_id: None,
            outbound_timeout: Duration::from_secs(5),
        };

        AppState {
            config: Arc::new(config),
            registry: Arc::new(registry),
            entitlements: Arc::new(entitlements),
            ledger_exports,
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
