//! Stateless payment rules shared by every payment use case.

use chrono::{Duration, NaiveDateTime};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    payment::{Currency, Payment, PaymentType},
    payment_status::PaymentStatus,
};

/// Length of the random part of an invoice id, in hex characters.
const INVOICE_TOKEN_HEX_LEN: usize = 20;

/// A violated payment rule. Use cases convert these into `AppError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentRuleViolation {
    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("amount {amount} is below the minimum of {min}")]
    AmountBelowMinimum { amount: i64, min: i64 },

    #[error("amount {amount} exceeds the maximum of {max}")]
    AmountAboveMaximum { amount: i64, max: i64 },

    #[error("currency {0} is not accepted")]
    CurrencyNotAllowed(Currency),

    #[error("invoice id is missing")]
    MissingInvoiceId,

    #[error("payment must expire after it is created")]
    InvalidExpiry,

    #[error("cannot transition payment from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

/// Configured bounds for new payments.
#[derive(Debug, Clone)]
pub struct PaymentLimits {
    pub min_amount: i64,
    pub max_amount: i64,
    pub allowed_currencies: Vec<Currency>,
    pub payment_ttl: Duration,
}

impl Default for PaymentLimits {
    fn default() -> Self {
        Self {
            min_amount: 100,
            max_amount: 10_000_000_000,
            allowed_currencies: Currency::ALL.to_vec(),
            payment_ttl: Duration::minutes(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaymentService {
    limits: PaymentLimits,
}

impl PaymentService {
    pub fn new(limits: PaymentLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PaymentLimits {
        &self.limits
    }

    pub fn validate_amount(
        &self,
        amount: i64,
        currency: Currency,
    ) -> Result<(), PaymentRuleViolation> {
        if amount <= 0 {
            return Err(PaymentRuleViolation::NonPositiveAmount);
        }
        if amount < self.limits.min_amount {
            return Err(PaymentRuleViolation::AmountBelowMinimum {
                amount,
                min: self.limits.min_amount,
            });
        }
        if amount > self.limits.max_amount {
            return Err(PaymentRuleViolation::AmountAboveMaximum {
                amount,
                max: self.limits.max_amount,
            });
        }
        if !self.limits.allowed_currencies.contains(&currency) {
            return Err(PaymentRuleViolation::CurrencyNotAllowed(currency));
        }
        Ok(())
    }

    /// Checks every invariant a stored payment must satisfy.
    pub fn validate(&self, payment: &Payment) -> Result<(), PaymentRuleViolation> {
        self.validate_amount(payment.amount, payment.currency)?;
        if payment.invoice_id.trim().is_empty() {
            return Err(PaymentRuleViolation::MissingInvoiceId);
        }
        if payment.expires_at <= payment.created_at {
            return Err(PaymentRuleViolation::InvalidExpiry);
        }
        Ok(())
    }

    /// Builds a fresh invoice id.
    ///
    /// The id mixes the member and payment type with 16 bytes from the OS RNG,
    /// so knowing a member id is not enough to guess invoice ids and spoof
    /// callbacks for them.
    pub fn generate_invoice_id(&self, member_id: Uuid, payment_type: PaymentType) -> String {
        let mut token = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut token);

        let mut hasher = Sha256::new();
        hasher.update(member_id.as_bytes());
        hasher.update(payment_type.as_str().as_bytes());
        hasher.update(token);
        let digest = hex::encode(hasher.finalize());

        format!(
            "{}-{}",
            payment_type.invoice_prefix(),
            &digest[..INVOICE_TOKEN_HEX_LEN]
        )
    }

    pub fn validate_status_transition(
        &self,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<(), PaymentRuleViolation> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(PaymentRuleViolation::InvalidTransition { from, to })
        }
    }

    /// Maps the gateway's status vocabulary onto ours. Anything unknown is
    /// treated as still in flight, never as a success.
    pub fn map_gateway_status(&self, raw: &str) -> PaymentStatus {
        match raw.trim().to_lowercase().as_str() {
            "success" | "succeeded" | "completed" | "approved" => PaymentStatus::Completed,
            "failed" | "failure" | "declined" | "error" => PaymentStatus::Failed,
            "cancelled" | "canceled" => PaymentStatus::Cancelled,
            "processing" | "pending" | "new" => PaymentStatus::Processing,
            other => {
                tracing::warn!(gateway_status = other, "Unrecognized gateway status");
                PaymentStatus::Processing
            }
        }
    }

    pub fn is_expired(&self, payment: &Payment, now: NaiveDateTime) -> bool {
        now >= payment.expires_at
    }

    pub fn is_final_status(&self, status: PaymentStatus) -> bool {
        status.is_final()
    }

    /// Creates a new Pending payment that expires after the configured TTL.
    pub fn new_pending_payment(
        &self,
        member_id: Uuid,
        amount: i64,
        currency: Currency,
        payment_type: PaymentType,
        related_entity_id: Option<Uuid>,
        now: NaiveDateTime,
    ) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            invoice_id: self.generate_invoice_id(member_id, payment_type),
            member_id,
            amount,
            currency,
            payment_type,
            status: PaymentStatus::Pending,
            gateway_transaction_id: None,
            card_mask: None,
            approval_code: None,
            error_code: None,
            error_message: None,
            gateway_response: None,
            gateway_status_response: None,
            refunded_amount: None,
            related_entity_id,
            created_at: now,
            updated_at: now,
            expires_at: now + self.limits.payment_ttl,
            completed_at: None,
        }
    }
}
