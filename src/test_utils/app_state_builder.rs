//! Test app state builder for HTTP-level tests.
//!
//! `TestAppStateBuilder` wires every use case to in-memory mocks. Override
//! the repositories a test needs to inspect; the rest start empty.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        payment::PaymentUseCases, payment_callback::CallbackUseCases, receipt::ReceiptUseCases,
        saved_card::SavedCardUseCases,
    },
    domain::services::payment_service::{PaymentLimits, PaymentService},
    infra::config::AppConfig,
    test_utils::{
        InMemoryCallbackRetryRepo, InMemoryPaymentRepo, InMemoryReceiptRepo,
        InMemorySavedCardRepo, MockGateway, test_gateway_config,
    },
};

/// Config with default limits and an unreachable database URL.
pub fn test_app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/library_payments_test".to_string(),
        bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        payment_limits: PaymentLimits::default(),
        gateway_provider: "dummy".to_string(),
        gateway: test_gateway_config(),
        expire_interval_secs: 60,
        expire_batch_size: 0,
        callback_retry_interval_secs: 30,
        callback_retry_batch_size: 50,
        callback_retry_max_attempts: 5,
    }
}

pub struct TestAppStateBuilder {
    payment_repo: Arc<InMemoryPaymentRepo>,
    retry_repo: Arc<InMemoryCallbackRetryRepo>,
    card_repo: Arc<InMemorySavedCardRepo>,
    receipt_repo: Arc<InMemoryReceiptRepo>,
    gateway: Arc<MockGateway>,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self {
            payment_repo: Arc::new(InMemoryPaymentRepo::new()),
            retry_repo: Arc::new(InMemoryCallbackRetryRepo::new()),
            card_repo: Arc::new(InMemorySavedCardRepo::new()),
            receipt_repo: Arc::new(InMemoryReceiptRepo::new()),
            gateway: Arc::new(MockGateway::new()),
        }
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payment_repo(mut self, repo: Arc<InMemoryPaymentRepo>) -> Self {
        self.payment_repo = repo;
        self
    }

    pub fn with_retry_repo(mut self, repo: Arc<InMemoryCallbackRetryRepo>) -> Self {
        self.retry_repo = repo;
        self
    }

    pub fn build(self) -> AppState {
        let config = test_app_config();
        let service = PaymentService::new(config.payment_limits.clone());

        let payment_use_cases = PaymentUseCases::new(
            self.payment_repo.clone(),
            self.gateway,
            Arc::new(config.gateway.clone()),
            service.clone(),
        );
        let callback_use_cases = CallbackUseCases::new(
            self.payment_repo.clone(),
            self.retry_repo,
            service,
            config.callback_retry_max_attempts,
        );

        AppState {
            payment_use_cases: Arc::new(payment_use_cases),
            callback_use_cases: Arc::new(callback_use_cases),
            saved_card_use_cases: Arc::new(SavedCardUseCases::new(self.card_repo)),
            receipt_use_cases: Arc::new(ReceiptUseCases::new(
                self.receipt_repo,
                self.payment_repo,
            )),
            config: Arc::new(config),
        }
    }
}
