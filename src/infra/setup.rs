use crate::{
    adapters::http::app_state::AppState,
    application::ports::ledger::LedgerExporter,
    infra::{
        InfraError, config::AppConfig, crypto::ProcessCipher, http_client::try_build_client,
        ledger_client::HttpLedgerExporter, postgres_persistence,
    },
    use_cases::{
        entitlement::EntitlementUseCases,
        gateway_settlement::GatewaySettlementPorts,
        ledger_export::{LedgerAccounts, LedgerExportUseCases},
        manual_settlement::ManualSettlementPorts,
        provider_registry::{ProviderRegistry, RegistrySettings},
    },
};
use secrecy::ExposeSecret;
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let cipher = ProcessCipher::new_from_base64(config.encryption_key.expose_secret())
        .map_err(InfraError::CipherInit)?;
    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let http = try_build_client(config.outbound_timeout).map_err(InfraError::HttpClient)?;

    let exporter: Arc<dyn LedgerExporter> = Arc::new(HttpLedgerExporter::new(
        http.clone(),
        config.ledger_export_url.clone(),
        config.ledger_export_token.clone(),
    ));

    let ledger_exports = Arc::new(LedgerExportUseCases::new(
        postgres_arc.clone(),
        exporter,
        postgres_arc.clone(),
        LedgerAccounts {
            debit_account: config.ledger_debit_account.clone(),
            credit_account: config.ledger_credit_account.clone(),
        },
    ));

    let manual_ports = ManualSettlementPorts {
        mandates: postgres_arc.clone(),
        payers: postgres_arc.clone(),
        tenants: postgres_arc.clone(),
        billing: postgres_arc.clone(),
        audit: postgres_arc.clone(),
    };

    let gateway_ports = GatewaySettlementPorts {
        intents: postgres_arc.clone(),
        payment_methods: postgres_arc.clone(),
        webhooks: postgres_arc.clone(),
        ledger: ledger_exports.clone(),
        audit: postgres_arc.clone(),
    };

    let registry = ProviderRegistry::new(
        cipher,
        postgres_arc.clone(),
        manual_ports,
        gateway_ports,
        http,
        RegistrySettings {
            gateway_api_base: config.gateway_api_base.clone(),
            default_creditor_id: config.default_creditor_id.clone(),
        },
    );

    let entitlements = EntitlementUseCases::new(
        postgres_arc.clone(),
        postgres_arc.clone(),
        postgres_arc,
    );

    Ok(AppState {
        config: Arc::new(config),
        registry: Arc::new(registry),
        entitlements: Arc::new(entitlements),
        ledger_exports,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "studio_settlement=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), skipped when the file cannot be created
    let json_layer = match File::create("app.log") {
        Ok(file) => Some(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true),
        ),
        Err(e) => {
            eprintln!("JSON log file disabled: {e}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
