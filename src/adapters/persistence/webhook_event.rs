use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::{
        PostgresPersistence,
        ledger_export::{self, LEDGER_COLUMNS},
        payment_intent::{self, INTENT_COLUMNS},
    },
    app_error::{AppError, AppResult},
    application::{
        ports::gateway::WebhookTransition,
        use_cases::gateway_settlement::{NewWebhookEvent, WebhookApplyOutcome, WebhookEventRepo},
    },
    domain::entities::payment_method::PaymentMethodKind,
};

#[async_trait]
impl WebhookEventRepo for PostgresPersistence {
    async fn apply_once(
        &self,
        event: &NewWebhookEvent,
        transition: &WebhookTransition,
        now: DateTime<Utc>,
    ) -> AppResult<WebhookApplyOutcome> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO gateway_webhook_events (id, tenant_id, external_id, event_type, payload, payload_raw, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (external_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.tenant_id)
        .bind(&event.external_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.payload_raw)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(WebhookApplyOutcome::Duplicate);
        }

        let mut intent = None;
        let mut ledger_entry = None;

        match transition {
            WebhookTransition::IntentSucceeded { external_id } => {
                intent = sqlx::query(&format!(
                    r#"
                    UPDATE payment_intents
                    SET status = 'succeeded', failure_message = NULL, updated_at = $3
                    WHERE tenant_id = $1 AND external_id = $2 AND status <> 'succeeded'
                    RETURNING {INTENT_COLUMNS}
                    "#
                ))
                .bind(event.tenant_id)
                .bind(external_id)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::from)?
                .as_ref()
                .map(payment_intent::row_to_profile);

                if let Some(succeeded) = &intent {
                    // Locked at creation so only the post-commit export picks it up first.
                    ledger_entry = sqlx::query(&format!(
                        r#"
                        INSERT INTO ledger_exports (id, tenant_id, payment_intent_id, status, locked_at, created_at)
                        VALUES ($1, $2, $3, 'pending', $4, $4)
                        ON CONFLICT (payment_intent_id) DO NOTHING
                        RETURNING {LEDGER_COLUMNS}
                        "#
                    ))
                    .bind(Uuid::new_v4())
                    .bind(succeeded.tenant_id)
                    .bind(succeeded.id)
                    .bind(now)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(AppError::from)?
                    .as_ref()
                    .map(ledger_export::row_to_profile);
                }
            }
            WebhookTransition::IntentFailed {
                external_id,
                failure_message,
            } => {
                intent = sqlx::query(&format!(
                    r#"
                    UPDATE payment_intents
                    SET status = 'failed', failure_message = $3, updated_at = $4
                    WHERE tenant_id = $1 AND external_id = $2 AND status = 'requires_action'
                    RETURNING {INTENT_COLUMNS}
                    "#
                ))
                .bind(event.tenant_id)
                .bind(external_id)
                .bind(failure_message)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::from)?
                .as_ref()
                .map(payment_intent::row_to_profile);
            }
            WebhookTransition::InstrumentSaved {
                payer_id,
                customer_id,
                instrument_ref,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO payer_payment_methods
                        (tenant_id, payer_id, method, gateway_customer_id, gateway_instrument_ref, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (tenant_id, payer_id) DO UPDATE SET
                        gateway_customer_id = COALESCE(EXCLUDED.gateway_customer_id, payer_payment_methods.gateway_customer_id),
                        gateway_instrument_ref = EXCLUDED.gateway_instrument_ref,
                        updated_at = EXCLUDED.updated_at
                    "#,
                )
                .bind(event.tenant_id)
                .bind(payer_id)
                .bind(PaymentMethodKind::Card.as_ref())
                .bind(customer_id)
                .bind(instrument_ref)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from)?;
            }
            WebhookTransition::Ignore { .. } => {}
        }

        tx.commit().await.map_err(AppError::from)?;

        Ok(WebhookApplyOutcome::Applied {
            intent,
            ledger_entry,
        })
    }
}
