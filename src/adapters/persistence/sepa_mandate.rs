use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::manual_settlement::{
        MandateReplacement, NewSepaMandate, SepaMandateProfile, SepaMandateRepo,
    },
    domain::entities::payment_method::PaymentMethodKind,
};

const MANDATE_COLUMNS: &str = "id, tenant_id, payer_id, iban, bic, payer_name, bank_name, \
                               mandate_reference, creditor_id, status, created_at, revoked_at";

fn row_to_profile(row: sqlx::postgres::PgRow) -> SepaMandateProfile {
    SepaMandateProfile {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        payer_id: row.get("payer_id"),
        iban: row.get("iban"),
        bic: row.get("bic"),
        payer_name: row.get("payer_name"),
        bank_name: row.get("bank_name"),
        mandate_reference: row.get("mandate_reference"),
        creditor_id: row.get("creditor_id"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        revoked_at: row.get("revoked_at"),
    }
}

#[async_trait]
impl SepaMandateRepo for PostgresPersistence {
    async fn replace_active(
        &self,
        mandate: &NewSepaMandate,
        now: DateTime<Utc>,
    ) -> AppResult<MandateReplacement> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        let superseded = sqlx::query(&format!(
            r#"
            UPDATE sepa_mandates
            SET status = 'revoked', revoked_at = $3
            WHERE tenant_id = $1 AND payer_id = $2 AND status = 'active'
            RETURNING {MANDATE_COLUMNS}
            "#
        ))
        .bind(mandate.tenant_id)
        .bind(mandate.payer_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .map(row_to_profile);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO sepa_mandates
                (id, tenant_id, payer_id, iban, bic, payer_name, bank_name,
                 mandate_reference, creditor_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active', $10)
            RETURNING {MANDATE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(mandate.tenant_id)
        .bind(mandate.payer_id)
        .bind(&mandate.iban)
        .bind(&mandate.bic)
        .bind(&mandate.payer_name)
        .bind(&mandate.bank_name)
        .bind(&mandate.mandate_reference)
        .bind(&mandate.creditor_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        sqlx::query(
            r#"
            INSERT INTO payer_payment_methods
                (tenant_id, payer_id, method, iban, bic, account_holder, bank_name,
                 mandate_reference, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tenant_id, payer_id) DO UPDATE SET
                method = EXCLUDED.method,
                iban = EXCLUDED.iban,
                bic = EXCLUDED.bic,
                account_holder = EXCLUDED.account_holder,
                bank_name = EXCLUDED.bank_name,
                mandate_reference = EXCLUDED.mandate_reference,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(mandate.tenant_id)
        .bind(mandate.payer_id)
        .bind(PaymentMethodKind::SepaDebit.as_ref())
        .bind(&mandate.iban)
        .bind(&mandate.bic)
        .bind(&mandate.payer_name)
        .bind(&mandate.bank_name)
        .bind(&mandate.mandate_reference)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;

        Ok(MandateReplacement {
            mandate: row_to_profile(row),
            superseded,
        })
    }

    async fn get_active_for_payer(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
    ) -> AppResult<Option<SepaMandateProfile>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {MANDATE_COLUMNS}
            FROM sepa_mandates
            WHERE tenant_id = $1 AND payer_id = $2 AND status = 'active'
            "#
        ))
        .bind(tenant_id)
        .bind(payer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn revoke_active(
        &self,
        tenant_id: Uuid,
        payer_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<SepaMandateProfile>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE sepa_mandates
            SET status = 'revoked', revoked_at = $3
            WHERE tenant_id = $1 AND payer_id = $2 AND status = 'active'
            RETURNING {MANDATE_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(payer_id)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list_active_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SepaMandateProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {MANDATE_COLUMNS}
            FROM sepa_mandates
            WHERE tenant_id = $1 AND status = 'active'
            ORDER BY payer_name, created_at
            "#
        ))
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }
}
