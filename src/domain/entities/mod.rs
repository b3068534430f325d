pub mod callback_retry;
pub mod payment;
pub mod payment_status;
pub mod receipt;
pub mod saved_card;
