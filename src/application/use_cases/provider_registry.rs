use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::gateway::GatewayApi,
    domain::entities::{
        gateway_mode::{GatewayMode, PUBLISHABLE_KEY_PREFIX, SECRET_KEY_PREFIX, WEBHOOK_SECRET_PREFIX},
        provider_kind::ProviderKind,
    },
    infra::{crypto::ProcessCipher, gateway_client::GatewayClient},
};

use super::{
    audit::{AuditAction, AuditLogEntry, AuditStatus, NewAuditEntry, record_entry},
    gateway_settlement::{GatewaySettlementPorts, GatewaySettlementProvider},
    manual_settlement::{ManualSettlementPorts, ManualSettlementProvider},
};

const CREDITOR_ID_LEN: usize = 18;
const MAX_AUDIT_PAGE: i64 = 200;

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct TenantPaymentConfigProfile {
    pub tenant_id: Uuid,
    pub provider: ProviderKind,
    pub creditor_id: Option<String>,
    pub gateway_secret_key_encrypted: Option<String>,
    pub gateway_publishable_key: Option<String>,
    pub gateway_webhook_secret_encrypted: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertPaymentConfig {
    pub tenant_id: Uuid,
    pub provider: ProviderKind,
    pub creditor_id: Option<String>,
    pub gateway_secret_key_encrypted: Option<String>,
    pub gateway_publishable_key: Option<String>,
    pub gateway_webhook_secret_encrypted: Option<String>,
}

#[async_trait]
pub trait TenantPaymentConfigRepo: Send + Sync {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<TenantPaymentConfigProfile>>;
    async fn upsert(&self, config: &UpsertPaymentConfig) -> AppResult<TenantPaymentConfigProfile>;
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Omitted or blank fields keep their stored value.
#[derive(Deserialize)]
pub struct UpdatePaymentConfigRequest {
    pub provider: ProviderKind,
    pub creditor_id: Option<String>,
    pub gateway_secret_key: Option<SecretString>,
    pub gateway_publishable_key: Option<String>,
    pub gateway_webhook_secret: Option<SecretString>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfiguredFields {
    pub creditor_id: bool,
    pub gateway_secret_key: bool,
    pub gateway_publishable_key: bool,
    pub gateway_webhook_secret: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentConfigStatus {
    pub provider: ProviderKind,
    pub provider_name: &'static str,
    pub is_configured: bool,
    pub fields: ConfiguredFields,
    pub gateway_mode: Option<GatewayMode>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Candidate configuration after merging a request with stored values.
#[derive(Debug, Clone, Copy)]
pub struct ConfigCandidate<'a> {
    pub provider: ProviderKind,
    pub creditor_id: Option<&'a str>,
    pub secret_key: Option<&'a str>,
    pub publishable_key: Option<&'a str>,
    pub webhook_secret: Option<&'a str>,
}

/// The provider a tenant currently settles through.
pub enum ActiveProvider {
    Manual(ManualSettlementProvider),
    Gateway(GatewaySettlementProvider),
}

impl ActiveProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ActiveProvider::Manual(_) => ProviderKind::Manual,
            ActiveProvider::Gateway(_) => ProviderKind::Gateway,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub gateway_api_base: String,
    pub default_creditor_id: Option<String>,
}

// ============================================================================
// Registry
// ============================================================================

/// Resolves each tenant's settlement provider from its stored configuration.
///
/// The registry owns:
/// - Decrypting stored gateway credentials
/// - Validating configuration changes per provider kind
/// - Building the provider instance bound to a tenant
pub struct ProviderRegistry {
    cipher: ProcessCipher,
    config_repo: Arc<dyn TenantPaymentConfigRepo>,
    manual_ports: ManualSettlementPorts,
    gateway_ports: GatewaySettlementPorts,
    http: reqwest::Client,
    settings: RegistrySettings,
    #[cfg(test)]
    gateway_api_override: Option<Arc<dyn GatewayApi>>,
}

impl ProviderRegistry {
    pub fn new(
        cipher: ProcessCipher,
        config_repo: Arc<dyn TenantPaymentConfigRepo>,
        manual_ports: ManualSettlementPorts,
        gateway_ports: GatewaySettlementPorts,
        http: reqwest::Client,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            cipher,
            config_repo,
            manual_ports,
            gateway_ports,
            http,
            settings,
            #[cfg(test)]
            gateway_api_override: None,
        }
    }

    #[cfg(test)]
    pub fn with_gateway_override(mut self, api: Arc<dyn GatewayApi>) -> Self {
        self.gateway_api_override = Some(api);
        self
    }

    /// Resolve the tenant's selected provider.
    ///
    /// Never fails: unreadable configuration degrades to the manual provider.
    pub async fn get_provider(&self, tenant_id: Uuid) -> ActiveProvider {
        let config = match self.config_repo.get_by_tenant(tenant_id).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Failed to load payment config, falling back to manual settlement"
                );
                None
            }
        };

        match config {
            Some(config) if config.provider == ProviderKind::Gateway => {
                match self.build_gateway(tenant_id, Some(&config)) {
                    Ok(gateway) => ActiveProvider::Gateway(gateway),
                    Err(e) => {
                        tracing::warn!(
                            tenant_id = %tenant_id,
                            error = %e,
                            "Failed to decrypt gateway credentials, falling back to manual settlement"
                        );
                        ActiveProvider::Manual(self.build_manual(tenant_id, None))
                    }
                }
            }
            config => ActiveProvider::Manual(self.build_manual(tenant_id, config.as_ref())),
        }
    }

    /// The manual provider for a tenant, regardless of which provider is selected.
    ///
    /// Never fails: an unreadable configuration leaves only the default creditor id.
    pub async fn manual_provider(&self, tenant_id: Uuid) -> ManualSettlementProvider {
        let config = match self.config_repo.get_by_tenant(tenant_id).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Failed to load payment config for manual settlement, using defaults"
                );
                None
            }
        };
        self.build_manual(tenant_id, config.as_ref())
    }

    /// The gateway provider for inbound webhooks, regardless of which provider is selected.
    ///
    /// Intents created while the gateway was active keep settling after a switch.
    pub async fn gateway_for_webhooks(&self, tenant_id: Uuid) -> AppResult<GatewaySettlementProvider> {
        let config = self.config_repo.get_by_tenant(tenant_id).await?;
        self.build_gateway(tenant_id, config.as_ref())
    }

    fn build_manual(
        &self,
        tenant_id: Uuid,
        config: Option<&TenantPaymentConfigProfile>,
    ) -> ManualSettlementProvider {
        let creditor_id = config
            .and_then(|c| c.creditor_id.clone())
            .or_else(|| self.settings.default_creditor_id.clone());
        ManualSettlementProvider::new(tenant_id, creditor_id, self.manual_ports.clone())
    }

    fn build_gateway(
        &self,
        tenant_id: Uuid,
        config: Option<&TenantPaymentConfigProfile>,
    ) -> AppResult<GatewaySettlementProvider> {
        let secret_key = self.decrypt_optional(config.and_then(|c| c.gateway_secret_key_encrypted.as_deref()))?;
        let webhook_secret =
            self.decrypt_optional(config.and_then(|c| c.gateway_webhook_secret_encrypted.as_deref()))?;
        let publishable_key = config.and_then(|c| c.gateway_publishable_key.clone());

        let api = secret_key.map(|key| self.gateway_api(key));

        Ok(GatewaySettlementProvider::new(
            tenant_id,
            api,
            publishable_key,
            webhook_secret,
            self.gateway_ports.clone(),
        ))
    }

    fn gateway_api(&self, secret_key: SecretString) -> Arc<dyn GatewayApi> {
        #[cfg(test)]
        if let Some(ref api) = self.gateway_api_override {
            return api.clone();
        }

        Arc::new(GatewayClient::new(
            self.http.clone(),
            self.settings.gateway_api_base.clone(),
            secret_key,
        ))
    }

    fn decrypt_optional(&self, encrypted: Option<&str>) -> AppResult<Option<SecretString>> {
        encrypted
            .map(|value| self.cipher.decrypt(value).map(|plain| SecretString::new(plain.into())))
            .transpose()
    }

    /// Merge, validate, encrypt and persist a configuration change.
    pub async fn update_config(
        &self,
        tenant_id: Uuid,
        request: UpdatePaymentConfigRequest,
    ) -> AppResult<PaymentConfigStatus> {
        let stored = self.config_repo.get_by_tenant(tenant_id).await?;

        let creditor_id = non_blank(request.creditor_id)
            .map(|c| c.to_uppercase())
            .or_else(|| stored.as_ref().and_then(|s| s.creditor_id.clone()));
        let publishable_key = non_blank(request.gateway_publishable_key)
            .or_else(|| stored.as_ref().and_then(|s| s.gateway_publishable_key.clone()));
        let secret_key = match non_blank_secret(request.gateway_secret_key) {
            Some(key) => Some(key),
            None => self.decrypt_optional(
                stored.as_ref().and_then(|s| s.gateway_secret_key_encrypted.as_deref()),
            )?,
        };
        let webhook_secret = match non_blank_secret(request.gateway_webhook_secret) {
            Some(secret) => Some(secret),
            None => self.decrypt_optional(
                stored.as_ref().and_then(|s| s.gateway_webhook_secret_encrypted.as_deref()),
            )?,
        };

        let errors = validate_config(&ConfigCandidate {
            provider: request.provider,
            creditor_id: creditor_id.as_deref(),
            secret_key: secret_key.as_ref().map(|s| s.expose_secret()),
            publishable_key: publishable_key.as_deref(),
            webhook_secret: webhook_secret.as_ref().map(|s| s.expose_secret()),
        });
        if !errors.is_empty() {
            tracing::info!(
                tenant_id = %tenant_id,
                provider = %request.provider,
                error_count = errors.len(),
                "Rejected payment config update"
            );
            return Err(AppError::Configuration(errors));
        }

        let gateway_secret_key_encrypted = secret_key
            .as_ref()
            .map(|s| self.cipher.encrypt(s.expose_secret()))
            .transpose()?;
        let gateway_webhook_secret_encrypted = webhook_secret
            .as_ref()
            .map(|s| self.cipher.encrypt(s.expose_secret()))
            .transpose()?;

        let saved = self
            .config_repo
            .upsert(&UpsertPaymentConfig {
                tenant_id,
                provider: request.provider,
                creditor_id,
                gateway_secret_key_encrypted,
                gateway_publishable_key: publishable_key,
                gateway_webhook_secret_encrypted,
            })
            .await?;

        let status = self.status_from(Some(&saved));

        let message = match status.gateway_mode {
            Some(mode) if saved.provider == ProviderKind::Gateway => {
                format!("Provider set to {} ({} mode)", saved.provider.display_name(), mode)
            }
            _ => format!("Provider set to {}", saved.provider.display_name()),
        };
        record_entry(
            self.manual_ports.audit.as_ref(),
            NewAuditEntry {
                tenant_id,
                payer_id: None,
                provider: saved.provider,
                action: AuditAction::UpdateConfig,
                status: AuditStatus::Success,
                message,
            },
        )
        .await;

        tracing::info!(
            tenant_id = %tenant_id,
            provider = %saved.provider,
            "Updated payment config"
        );

        Ok(status)
    }

    pub async fn get_status(&self, tenant_id: Uuid) -> AppResult<PaymentConfigStatus> {
        let config = self.config_repo.get_by_tenant(tenant_id).await?;
        Ok(self.status_from(config.as_ref()))
    }

    /// Latest provider interactions for a tenant, newest first.
    pub async fn recent_audit_entries(&self, tenant_id: Uuid, limit: i64) -> AppResult<Vec<AuditLogEntry>> {
        self.manual_ports
            .audit
            .list_recent(tenant_id, limit.clamp(1, MAX_AUDIT_PAGE))
            .await
    }

    fn status_from(&self, config: Option<&TenantPaymentConfigProfile>) -> PaymentConfigStatus {
        let provider = config.map(|c| c.provider).unwrap_or_default();
        let fields = ConfiguredFields {
            creditor_id: config.is_some_and(|c| c.creditor_id.is_some())
                || self.settings.default_creditor_id.is_some(),
            gateway_secret_key: config.is_some_and(|c| c.gateway_secret_key_encrypted.is_some()),
            gateway_publishable_key: config.is_some_and(|c| c.gateway_publishable_key.is_some()),
            gateway_webhook_secret: config
                .is_some_and(|c| c.gateway_webhook_secret_encrypted.is_some()),
        };
        let is_configured = match provider {
            ProviderKind::Manual => fields.creditor_id,
            ProviderKind::Gateway => fields.gateway_secret_key && fields.gateway_publishable_key,
        };
        let gateway_mode = config
            .and_then(|c| c.gateway_publishable_key.as_deref())
            .and_then(|key| GatewayMode::from_key(key, PUBLISHABLE_KEY_PREFIX));

        PaymentConfigStatus {
            provider,
            provider_name: provider.display_name(),
            is_configured,
            fields,
            gateway_mode,
            last_updated: config.map(|c| c.updated_at),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_blank_secret(value: Option<SecretString>) -> Option<SecretString> {
    value
        .map(|v| v.expose_secret().trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::new(v.into()))
}

/// Every problem with the candidate configuration. Empty when it is valid.
pub fn validate_config(candidate: &ConfigCandidate<'_>) -> Vec<String> {
    let mut errors = Vec::new();

    match (candidate.provider, candidate.creditor_id) {
        (ProviderKind::Manual, None) => {
            errors.push("Creditor id is required for SEPA direct debit".to_string())
        }
        (_, Some(creditor_id)) if !is_valid_creditor_id(creditor_id) => errors.push(
            "Creditor id must be DE, 2 check digits, a 3 character business code and 11 digits"
                .to_string(),
        ),
        _ => {}
    }

    if candidate.provider.requires_credentials() {
        let mode = match candidate.secret_key {
            None => {
                errors.push("Secret key is required".to_string());
                None
            }
            Some(key) => {
                let mode = GatewayMode::from_key(key, SECRET_KEY_PREFIX);
                if mode.is_none() {
                    errors.push("Secret key must start with sk_test_ or sk_live_".to_string());
                }
                mode
            }
        };

        match (candidate.publishable_key, mode) {
            (None, _) => errors.push("Publishable key is required".to_string()),
            (Some(key), Some(mode)) => {
                if let Err(e) = mode.validate_key_prefix(key, PUBLISHABLE_KEY_PREFIX, "Publishable key") {
                    errors.push(e);
                }
            }
            (Some(key), None) => {
                if GatewayMode::from_key(key, PUBLISHABLE_KEY_PREFIX).is_none() {
                    errors.push("Publishable key must start with pk_test_ or pk_live_".to_string());
                }
            }
        }

        if candidate
            .webhook_secret
            .is_some_and(|secret| !secret.starts_with(WEBHOOK_SECRET_PREFIX))
        {
            errors.push("Webhook secret must start with whsec_".to_string());
        }
    }

    errors
}

/// `DE` + 2 check digits + 3 alphanumeric business code + 11 digits.
pub fn is_valid_creditor_id(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == CREDITOR_ID_LEN
        && &bytes[..2] == b"DE"
        && bytes[2..4].iter().all(u8::is_ascii_digit)
        && bytes[4..7].iter().all(u8::is_ascii_alphanumeric)
        && bytes[7..].iter().all(u8::is_ascii_digit)
}
