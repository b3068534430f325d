//! Scriptable payment gateway for use case tests.
//!
//! Every call is recorded so tests can assert on what reached the gateway.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        AuthTokenRequest, GatewayStatusResponse, GatewayTransaction, PaymentGatewayPort,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct RefundCall {
    pub transaction_id: String,
    pub partial_amount: Option<Decimal>,
    pub payment_id: Uuid,
}

pub struct MockGateway {
    auth_token: Option<String>,
    status: Option<GatewayStatusResponse>,
    refund_fails: bool,
    auth_requests: Mutex<Vec<AuthTokenRequest>>,
    refund_calls: Mutex<Vec<RefundCall>>,
    status_calls: Mutex<usize>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            auth_token: Some("test-auth-token".to_string()),
            status: None,
            refund_fails: false,
            auth_requests: Mutex::new(Vec::new()),
            refund_calls: Mutex::new(Vec::new()),
            status_calls: Mutex::new(0),
        }
    }
}

impl MockGateway {
    /// Issues tokens and accepts refunds. Status checks fail until
    /// `with_status` is used.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    pub fn failing_auth(mut self) -> Self {
        self.auth_token = None;
        self
    }

    pub fn with_status(mut self, transaction: GatewayTransaction) -> Self {
        let raw = serde_json::to_value(&transaction).unwrap();
        self.status = Some(GatewayStatusResponse { transaction, raw });
        self
    }

    pub fn failing_refunds(mut self) -> Self {
        self.refund_fails = true;
        self
    }

    pub fn auth_requests(&self) -> Vec<AuthTokenRequest> {
        self.auth_requests.lock().unwrap().clone()
    }

    pub fn refund_calls(&self) -> Vec<RefundCall> {
        self.refund_calls.lock().unwrap().clone()
    }

    pub fn status_call_count(&self) -> usize {
        *self.status_calls.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGatewayPort for MockGateway {
    async fn get_auth_token(&self, request: &AuthTokenRequest) -> AppResult<String> {
        self.auth_requests.lock().unwrap().push(request.clone());
        self.auth_token
            .clone()
            .ok_or_else(|| AppError::External("gateway rejected token request".into()))
    }

    async fn check_payment_status(&self, _invoice_id: &str) -> AppResult<GatewayStatusResponse> {
        *self.status_calls.lock().unwrap() += 1;
        self.status
            .clone()
            .ok_or_else(|| AppError::External("gateway status unavailable".into()))
    }

    async fn refund_payment(
        &self,
        gateway_transaction_id: &str,
        partial_amount: Option<Decimal>,
        payment_id: Uuid,
    ) -> AppResult<()> {
        if self.refund_fails {
            return Err(AppError::External("gateway refund declined".into()));
        }
        self.refund_calls.lock().unwrap().push(RefundCall {
            transaction_id: gateway_transaction_id.to_string(),
            partial_amount,
            payment_id,
        });
        Ok(())
    }
}
