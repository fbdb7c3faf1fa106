use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::ports::directory::{
        ActiveContract, BillingReader, PayerDirectory, PayerProfile, PostalAddress, TenantDirectory,
        TenantProfile,
    },
    domain::entities::payment_method::PaymentMethodKind,
};

fn row_to_address(row: &sqlx::postgres::PgRow) -> PostalAddress {
    PostalAddress {
        street: row.get("street"),
        postal_code: row.get("postal_code"),
        city: row.get("city"),
    }
}

#[async_trait]
impl PayerDirectory for PostgresPersistence {
    async fn get_payer(&self, tenant_id: Uuid, payer_id: Uuid) -> AppResult<Option<PayerProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, TRIM(first_name || ' ' || last_name) AS display_name,
                   email, street, postal_code, city, payment_method
            FROM members
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(payer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(|row| {
            let method: Option<String> = row.get("payment_method");
            PayerProfile {
                id: row.get("id"),
                tenant_id: row.get("tenant_id"),
                display_name: row.get("display_name"),
                email: row.get("email"),
                address: row_to_address(&row),
                payment_method: method.as_deref().map(PaymentMethodKind::parse_lenient),
            }
        }))
    }
}

#[async_trait]
impl TenantDirectory for PostgresPersistence {
    async fn get_tenant(&self, tenant_id: Uuid) -> AppResult<Option<TenantProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, street, postal_code, city
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(|row| TenantProfile {
            id: row.get("id"),
            name: row.get("name"),
            address: row_to_address(&row),
        }))
    }
}

#[async_trait]
impl BillingReader for PostgresPersistence {
    async fn list_active_contracts(&self, tenant_id: Uuid) -> AppResult<Vec<ActiveContract>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id AS contract_id, m.id AS payer_id,
                   TRIM(m.first_name || ' ' || m.last_name) AS payer_name,
                   c.plan_name, c.monthly_fee_cents, m.payment_method
            FROM contracts c
            JOIN members m ON m.id = c.member_id AND m.tenant_id = c.tenant_id
            WHERE c.tenant_id = $1 AND c.status = 'active'
            ORDER BY m.last_name, m.first_name
            "#,
        )
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .iter()
            .map(|row| {
                let method: Option<String> = row.get("payment_method");
                ActiveContract {
                    contract_id: row.get("contract_id"),
                    payer_id: row.get("payer_id"),
                    payer_name: row.get("payer_name"),
                    plan_name: row.get("plan_name"),
                    monthly_fee_cents: row.get("monthly_fee_cents"),
                    payment_method: method
                        .as_deref()
                        .map(PaymentMethodKind::parse_lenient)
                        .unwrap_or(PaymentMethodKind::Other),
                }
            })
            .collect())
    }

    async fn open_invoice_balances(&self, tenant_id: Uuid) -> AppResult<HashMap<Uuid, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT member_id, COALESCE(SUM(amount_cents - paid_cents), 0)::BIGINT AS balance_cents
            FROM invoices
            WHERE tenant_id = $1 AND status IN ('open', 'partially_paid', 'overdue')
            GROUP BY member_id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .iter()
            .map(|row| (row.get("member_id"), row.get("balance_cents")))
            .collect())
    }
}
