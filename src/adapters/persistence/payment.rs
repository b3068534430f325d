use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::payment::PaymentRepoTrait,
    domain::entities::{payment::Payment, payment_status::PaymentStatus},
};

const SELECT_COLS: &str = r#"
    id, invoice_id, member_id, amount, currency, payment_type, status,
    gateway_transaction_id, card_mask, approval_code, error_code, error_message,
    gateway_response, gateway_status_response, refunded_amount, related_entity_id,
    created_at, updated_at, expires_at, completed_at
"#;

fn row_to_payment(row: sqlx::postgres::PgRow) -> Payment {
    Payment {
        id: row.get("id"),
        invoice_id: row.get("invoice_id"),
        member_id: row.get("member_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        payment_type: row.get("payment_type"),
        status: row.get("status"),
        gateway_transaction_id: row.get("gateway_transaction_id"),
        card_mask: row.get("card_mask"),
        approval_code: row.get("approval_code"),
        error_code: row.get("error_code"),
        error_message: row.get("error_message"),
        gateway_response: row.get("gateway_response"),
        gateway_status_response: row.get("gateway_status_response"),
        refunded_amount: row.get("refunded_amount"),
        related_entity_id: row.get("related_entity_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        expires_at: row.get("expires_at"),
        completed_at: row.get("completed_at"),
    }
}

#[async_trait]
impl PaymentRepoTrait for PostgresPersistence {
    async fn create(&self, payment: &Payment) -> AppResult<Payment> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                id, invoice_id, member_id, amount, currency, payment_type, status,
                related_entity_id, created_at, updated_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(payment.id)
        .bind(&payment.invoice_id)
        .bind(payment.member_id)
        .bind(payment.amount)
        .bind(payment.currency)
        .bind(payment.payment_type)
        .bind(payment.status)
        .bind(payment.related_entity_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .bind(payment.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_payment(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let row = sqlx::query(&format!("SELECT {} FROM payments WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(row.map(row_to_payment))
    }

    async fn get_by_invoice_id(&self, invoice_id: &str) -> AppResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE invoice_id = $1",
            SELECT_COLS
        ))
        .bind(invoice_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_payment))
    }

    async fn update(&self, payment: &Payment, expected_status: PaymentStatus) -> AppResult<bool> {
        // invoice_id, member_id, amount and currency are immutable and never written here.
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $3,
                gateway_transaction_id = $4,
                card_mask = $5,
                approval_code = $6,
                error_code = $7,
                error_message = $8,
                gateway_response = $9,
                refunded_amount = $10,
                completed_at = $11,
                updated_at = $12,
                gateway_status_response = $13
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(payment.id)
        .bind(expected_status)
        .bind(payment.status)
        .bind(&payment.gateway_transaction_id)
        .bind(&payment.card_mask)
        .bind(&payment.approval_code)
        .bind(&payment.error_code)
        .bind(&payment.error_message)
        .bind(&payment.gateway_response)
        .bind(payment.refunded_amount)
        .bind(payment.completed_at)
        .bind(payment.updated_at)
        .bind(&payment.gateway_status_response)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_status: PaymentStatus,
        new_status: PaymentStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $3,
                error_code = COALESCE($4, error_code),
                error_message = COALESCE($5, error_message),
                completed_at = CASE WHEN $3 = 'completed'::payment_status THEN $6 ELSE completed_at END,
                updated_at = $6
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected_status)
        .bind(new_status)
        .bind(error_code)
        .bind(error_message)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_status(&self, status: PaymentStatus) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE status = $1 ORDER BY expires_at",
            SELECT_COLS
        ))
        .bind(status)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_payment).collect())
    }

    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE member_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(member_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_payment).collect())
    }
}
