use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::receipt::ReceiptRepoTrait,
    domain::entities::receipt::Receipt,
};

const SELECT_COLS: &str = r#"
    id, payment_id, receipt_number, member_id, invoice_id, amount, currency,
    payment_type, items, card_mask, approval_code, issued_at
"#;

fn row_to_receipt(row: sqlx::postgres::PgRow) -> Receipt {
    let id: Uuid = row.get("id");
    let items_json: serde_json::Value = row.get("items");
    Receipt {
        id,
        payment_id: row.get("payment_id"),
        receipt_number: row.get("receipt_number"),
        member_id: row.get("member_id"),
        invoice_id: row.get("invoice_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        payment_type: row.get("payment_type"),
        items: parse_json_with_fallback(&items_json, "items", "receipt", &id.to_string()),
        card_mask: row.get("card_mask"),
        approval_code: row.get("approval_code"),
        issued_at: row.get("issued_at"),
    }
}

#[async_trait]
impl ReceiptRepoTrait for PostgresPersistence {
    async fn create(&self, receipt: &Receipt) -> AppResult<Receipt> {
        let items = serde_json::to_value(&receipt.items)
            .map_err(|e| AppError::Internal(format!("failed to encode receipt items: {}", e)))?;

        // A concurrent request may have issued the receipt first; keep theirs.
        sqlx::query(
            r#"
            INSERT INTO receipts (
                id, payment_id, receipt_number, member_id, invoice_id, amount, currency,
                payment_type, items, card_mask, approval_code, issued_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (payment_id) DO NOTHING
            "#,
        )
        .bind(receipt.id)
        .bind(receipt.payment_id)
        .bind(&receipt.receipt_number)
        .bind(receipt.member_id)
        .bind(&receipt.invoice_id)
        .bind(receipt.amount)
        .bind(receipt.currency)
        .bind(receipt.payment_type)
        .bind(items)
        .bind(&receipt.card_mask)
        .bind(&receipt.approval_code)
        .bind(receipt.issued_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM receipts WHERE payment_id = $1",
            SELECT_COLS
        ))
        .bind(receipt.payment_id)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_receipt(row))
    }

    async fn get_by_payment_id(&self, payment_id: Uuid) -> AppResult<Option<Receipt>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM receipts WHERE payment_id = $1",
            SELECT_COLS
        ))
        .bind(payment_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_receipt))
    }

    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<Receipt>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM receipts WHERE member_id = $1 ORDER BY issued_at DESC",
            SELECT_COLS
        ))
        .bind(member_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_receipt).collect())
    }
}
