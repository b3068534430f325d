use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payment::{Currency, Payment, PaymentType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub description: String,
    pub quantity: i32,
    pub unit_amount: i64,
    pub total_amount: i64,
}

/// Immutable snapshot of a completed payment. One per payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub receipt_number: String,
    pub member_id: Uuid,
    pub invoice_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub payment_type: PaymentType,
    pub items: Vec<ReceiptItem>,
    pub card_mask: Option<String>,
    pub approval_code: Option<String>,
    pub issued_at: NaiveDateTime,
}

impl Receipt {
    pub fn from_payment(payment: &Payment, issued_at: NaiveDateTime) -> Self {
        // The full payment id keeps numbers unique across payments issued the same day.
        let payment_ref = payment.id.simple().to_string().to_uppercase();
        Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            receipt_number: format!("RCP-{}-{}", issued_at.format("%Y%m%d"), payment_ref),
            member_id: payment.member_id,
            invoice_id: payment.invoice_id.clone(),
            amount: payment.amount,
            currency: payment.currency,
            payment_type: payment.payment_type,
            items: vec![ReceiptItem {
                description: payment.payment_type.description().to_string(),
                quantity: 1,
                unit_amount: payment.amount,
                total_amount: payment.amount,
            }],
            card_mask: payment.card_mask.clone(),
            approval_code: payment.approval_code.clone(),
            issued_at,
        }
    }
}
