use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use strum::{AsRefStr, EnumString};
use url::Url;

use super::gateway_client::DEFAULT_GATEWAY_API_BASE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AppEnvironment {
    Development,
    Production,
}

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub environment: AppEnvironment,
    pub cors_origin: HeaderValue,
    /// Base64 of the 32-byte key that encrypts tenant gateway credentials.
    pub encryption_key: SecretString,
    pub gateway_api_base: String,
    /// Endpoint accepting accounting records as JSON.
    pub ledger_export_url: Url,
    pub ledger_export_token: Option<SecretString>,
    pub ledger_debit_account: String,
    pub ledger_credit_account: String,
    /// Creditor id used for tenants that have not configured their own.
    pub default_creditor_id: Option<String>,
    pub outbound_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3002)));

        let app_env: String = get_env_default("APP_ENV", "production".to_string());
        let environment = AppEnvironment::from_str(&app_env).unwrap_or_else(|_| {
            tracing::warn!(app_env = %app_env, "Unknown APP_ENV, assuming production");
            AppEnvironment::Production
        });

        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000"));

        let encryption_key = SecretString::new(get_env::<String>("CONFIG_ENCRYPTION_KEY").into());
        let gateway_api_base: String =
            get_env_default("GATEWAY_API_BASE", DEFAULT_GATEWAY_API_BASE.to_string());

        let ledger_export_url: Url = get_env("LEDGER_EXPORT_URL");
        let ledger_export_token = optional_env("LEDGER_EXPORT_TOKEN")
            .map(|token| SecretString::new(token.into()));
        let ledger_debit_account: String = get_env_default("LEDGER_DEBIT_ACCOUNT", "1200".to_string());
        let ledger_credit_account: String =
            get_env_default("LEDGER_CREDIT_ACCOUNT", "8400".to_string());

        let default_creditor_id = optional_env("DEFAULT_CREDITOR_ID").map(|c| c.to_uppercase());
        let outbound_timeout_secs: u64 = get_env_default("OUTBOUND_TIMEOUT_SECS", 30);

        Self {
            database_url,
            bind_addr,
            environment,
            cors_origin,
            encryption_key,
            gateway_api_base,
            ledger_export_url,
            ledger_export_token,
            ledger_debit_account,
            ledger_credit_account,
            default_creditor_id,
            outbound_timeout: Duration::from_secs(outbound_timeout_secs.max(1)),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == AppEnvironment::Production
    }

    /// Unsigned gateway webhooks are only accepted outside production.
    pub fn allow_unsigned_webhooks(&self) -> bool {
        !self.is_production()
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
