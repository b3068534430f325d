use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{app_error::AppResult, domain::entities::payment::Currency};

// ============================================================================
// Port Types - Provider-agnostic gateway types
// ============================================================================

/// What the gateway needs to issue a checkout token for one invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTokenRequest {
    pub invoice_id: String,
    /// Amount in major units. Converted from minor units right before the call.
    pub amount: Decimal,
    pub currency: Currency,
}

/// The gateway's view of a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    #[serde(default)]
    pub id: String,
    /// Provider status vocabulary, mapped by `PaymentService::map_gateway_status`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub card_mask: String,
    #[serde(default)]
    pub approval_code: String,
}

/// Result of a status lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayStatusResponse {
    pub transaction: GatewayTransaction,
    /// Untouched provider response, stored for audit only.
    #[serde(default)]
    pub raw: serde_json::Value,
}

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// Payment gateway port - the operations the payment engine needs from a
/// card-acquiring provider. Implementations own the wire protocol; every
/// failure is reported as `AppError::External`.
///
/// None of these calls are retried by callers. Cancellation happens by
/// dropping the future, so implementations must not leave partial state
/// behind on drop.
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    /// Obtain a short-lived token the client uses to open the checkout widget.
    async fn get_auth_token(&self, request: &AuthTokenRequest) -> AppResult<String>;

    /// Ask the gateway for the current state of an invoice.
    async fn check_payment_status(&self, invoice_id: &str) -> AppResult<GatewayStatusResponse>;

    /// Refund a settled transaction. `partial_amount` is `None` for a full refund.
    async fn refund_payment(
        &self,
        gateway_transaction_id: &str,
        partial_amount: Option<Decimal>,
        payment_id: Uuid,
    ) -> AppResult<()>;
}

/// Checkout parameters surfaced to the client alongside the auth token.
pub trait GatewayConfig: Send + Sync {
    fn terminal(&self) -> &str;
    fn back_link(&self) -> &str;
    fn post_link(&self) -> &str;
    fn widget_url(&self) -> &str;
}
