use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payment_status::PaymentStatus;

/// ISO-4217 currencies accepted by the payment module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "currency", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Kzt,
    Usd,
    Eur,
    Rub,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::Kzt, Currency::Usd, Currency::Eur, Currency::Rub];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Kzt => "KZT",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Rub => "RUB",
        }
    }

    /// Number of decimal places between the major and minor unit
    /// (tiyn, cents, kopecks).
    pub fn minor_unit_exponent(&self) -> u32 {
        match self {
            Currency::Kzt | Currency::Usd | Currency::Eur | Currency::Rub => 2,
        }
    }

    /// Converts an integer amount in minor units into an exact decimal in
    /// major units. Only used when talking to the gateway.
    pub fn to_major_units(&self, minor: i64) -> Decimal {
        Decimal::new(minor, self.minor_unit_exponent())
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "KZT" => Ok(Currency::Kzt),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "RUB" => Ok(Currency::Rub),
            _ => Err(format!("Unsupported currency: {}", s)),
        }
    }
}

/// What a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Fine,
    Subscription,
    Deposit,
    Purchase,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Fine => "fine",
            PaymentType::Subscription => "subscription",
            PaymentType::Deposit => "deposit",
            PaymentType::Purchase => "purchase",
        }
    }

    /// Short prefix used in invoice identifiers.
    pub fn invoice_prefix(&self) -> &'static str {
        match self {
            PaymentType::Fine => "FIN",
            PaymentType::Subscription => "SUB",
            PaymentType::Deposit => "DEP",
            PaymentType::Purchase => "PUR",
        }
    }

    /// Human readable line-item description for receipts.
    pub fn description(&self) -> &'static str {
        match self {
            PaymentType::Fine => "Library fine",
            PaymentType::Subscription => "Library subscription",
            PaymentType::Deposit => "Security deposit",
            PaymentType::Purchase => "Library purchase",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fine" => Ok(PaymentType::Fine),
            "subscription" => Ok(PaymentType::Subscription),
            "deposit" => Ok(PaymentType::Deposit),
            "purchase" => Ok(PaymentType::Purchase),
            _ => Err(format!("Invalid payment type: {}", s)),
        }
    }
}

/// A single payment attempt, tracked from creation until it settles.
///
/// Amounts are integers in the currency's minor unit. Rows are never deleted;
/// they form the financial audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: String,
    pub member_id: Uuid,
    pub amount: i64,
    pub currency: Currency,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub gateway_transaction_id: Option<String>,
    pub card_mask: Option<String>,
    pub approval_code: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Raw payload of the last gateway callback, retained verbatim for dispute resolution.
    pub gateway_response: Option<serde_json::Value>,
    /// Raw payload of the last status check that changed this payment.
    pub gateway_status_response: Option<serde_json::Value>,
    pub refunded_amount: Option<i64>,
    pub related_entity_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl Payment {
    pub fn is_owned_by(&self, member_id: Uuid) -> bool {
        self.member_id == member_id
    }

    /// Moment the payment settled, falling back to creation for rows that
    /// predate `completed_at` being recorded.
    pub fn settled_at(&self) -> NaiveDateTime {
        self.completed_at.unwrap_or(self.created_at)
    }

    pub fn amount_in_major_units(&self) -> Decimal {
        self.currency.to_major_units(self.amount)
    }
}
