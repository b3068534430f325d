use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        AuthTokenRequest, GatewayStatusResponse, GatewayTransaction, PaymentGatewayPort,
    },
};

/// Local gateway for development.
///
/// Simulates the checkout flow without any network calls: every issued
/// token settles immediately, so a follow-up status check reports success.
#[derive(Default)]
pub struct DummyGateway {
    transactions: Mutex<HashMap<String, DummyTransaction>>,
}

struct DummyTransaction {
    id: String,
    amount: Decimal,
    refunded: Decimal,
}

impl DummyGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, DummyTransaction>>> {
        self.transactions
            .lock()
            .map_err(|_| AppError::Internal("dummy gateway state poisoned".into()))
    }
}

#[async_trait]
impl PaymentGatewayPort for DummyGateway {
    async fn get_auth_token(&self, request: &AuthTokenRequest) -> AppResult<String> {
        let transaction = DummyTransaction {
            id: format!("dummy_txn_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            refunded: Decimal::ZERO,
        };
        self.lock()?
            .insert(request.invoice_id.clone(), transaction);

        info!(
            invoice_id = %request.invoice_id,
            amount = %request.amount,
            currency = %request.currency,
            "Dummy gateway issued auth token"
        );
        Ok(format!("dummy_tok_{}", Uuid::new_v4().simple()))
    }

    async fn check_payment_status(&self, invoice_id: &str) -> AppResult<GatewayStatusResponse> {
        let transactions = self.lock()?;
        let found = transactions
            .get(invoice_id)
            .ok_or_else(|| AppError::External(format!("unknown invoice {}", invoice_id)))?;

        let status = if found.refunded > Decimal::ZERO {
            "refunded"
        } else {
            "success"
        };
        let transaction = GatewayTransaction {
            id: found.id.clone(),
            status: status.to_string(),
            card_mask: "400000******0002".to_string(),
            approval_code: "DUMMY0".to_string(),
        };
        let raw = serde_json::json!({
            "provider": "dummy",
            "invoiceId": invoice_id,
            "transaction": &transaction,
        });
        Ok(GatewayStatusResponse { transaction, raw })
    }

    async fn refund_payment(
        &self,
        gateway_transaction_id: &str,
        partial_amount: Option<Decimal>,
        payment_id: Uuid,
    ) -> AppResult<()> {
        let mut transactions = self.lock()?;
        let transaction = transactions
            .values_mut()
            .find(|t| t.id == gateway_transaction_id)
            .ok_or_else(|| {
                AppError::External(format!("unknown transaction {}", gateway_transaction_id))
            })?;

        let amount = partial_amount.unwrap_or(transaction.amount);
        if transaction.refunded + amount > transaction.amount {
            return Err(AppError::External("refund exceeds captured amount".into()));
        }
        transaction.refunded += amount;

        info!(%payment_id, %amount, "Dummy gateway refunded transaction");
        Ok(())
    }
}
