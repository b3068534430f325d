use std::sync::Arc;

use crate::{
    application::use_cases::{
        payment::PaymentUseCases, payment_callback::CallbackUseCases, receipt::ReceiptUseCases,
        saved_card::SavedCardUseCases,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub payment_use_cases: Arc<PaymentUseCases>,
    pub callback_use_cases: Arc<CallbackUseCases>,
    pub saved_card_use_cases: Arc<SavedCardUseCases>,
    pub receipt_use_cases: Arc<ReceiptUseCases>,
}
