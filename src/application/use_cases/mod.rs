pub mod payment;
pub mod payment_callback;
pub mod receipt;
pub mod saved_card;
