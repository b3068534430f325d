//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{Datelike, Duration, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::entities::{
        payment::{Currency, Payment, PaymentType},
        payment_status::PaymentStatus,
        saved_card::SavedCard,
    },
    infra::config::GatewayCheckoutConfig,
};

/// Create a Pending payment that expires 30 minutes from now.
pub fn create_test_payment(overrides: impl FnOnce(&mut Payment)) -> Payment {
    let now = Utc::now().naive_utc();
    let id = Uuid::new_v4();
    let mut payment = Payment {
        id,
        invoice_id: format!("FIN-{}", &id.simple().to_string()[..20]),
        member_id: Uuid::new_v4(),
        amount: 5_000,
        currency: Currency::Kzt,
        payment_type: PaymentType::Fine,
        status: PaymentStatus::Pending,
        gateway_transaction_id: None,
        card_mask: None,
        approval_code: None,
        error_code: None,
        error_message: None,
        gateway_response: None,
        gateway_status_response: None,
        refunded_amount: None,
        related_entity_id: None,
        created_at: now,
        updated_at: now,
        expires_at: now + Duration::minutes(30),
        completed_at: None,
    };
    overrides(&mut payment);
    payment
}

/// Create an active, unexpired saved card owned by a random member.
pub fn create_test_card(overrides: impl FnOnce(&mut SavedCard)) -> SavedCard {
    let now = Utc::now().naive_utc();
    let mut card = SavedCard {
        id: Uuid::new_v4(),
        member_id: Uuid::new_v4(),
        card_token: format!("tok_{}", Uuid::new_v4().simple()),
        card_mask: "440043******1234".to_string(),
        card_type: "VISA".to_string(),
        expiry_month: 12,
        expiry_year: now.year() + 3,
        is_default: false,
        is_active: true,
        created_at: now,
    };
    overrides(&mut card);
    card
}

pub fn test_gateway_config() -> GatewayCheckoutConfig {
    GatewayCheckoutConfig {
        terminal: "67e34d63-102f-4bd1-898e-370781d0074d".to_string(),
        back_link: "https://library.example.com/payments/return".to_string(),
        post_link: "https://library.example.com/api/payments/callback".to_string(),
        widget_url: "https://widget.gateway.example.com/payment-api.js".to_string(),
    }
}

/// Returns a fixed test datetime (2024-01-15 12:00:00).
pub fn test_datetime() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-01-15 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_payment_with_defaults() {
        let payment = create_test_payment(|_| {});
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.expires_at > payment.created_at);
        assert!(payment.invoice_id.starts_with("FIN-"));
    }

    #[test]
    fn test_create_card_with_overrides() {
        let member_id = Uuid::new_v4();
        let card = create_test_card(|c| {
            c.member_id = member_id;
            c.is_default = true;
        });
        assert_eq!(card.member_id, member_id);
        assert!(card.is_default);
        assert!(card.can_be_used(Utc::now().date_naive()));
    }
}
