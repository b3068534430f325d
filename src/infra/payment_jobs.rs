use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::application::use_cases::{
    payment::PaymentUseCases,
    payment_callback::{CallbackUseCases, STALE_RETRY_THRESHOLD_SECS},
};

const STALE_CHECK_INTERVAL_SECS: u64 = 60;

pub async fn run_expire_payments_loop(
    payment_uc: Arc<PaymentUseCases>,
    interval_secs: u64,
    batch_size: Option<usize>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));

    info!(
        "Payment expiry sweep started (every {}s, batch {:?})",
        interval_secs, batch_size
    );

    loop {
        ticker.tick().await;

        if let Err(e) = payment_uc.expire_payments(batch_size).await {
            error!(error = %e, "Payment expiry sweep failed");
        }
    }
}

pub async fn run_callback_retry_loop(
    callback_uc: Arc<CallbackUseCases>,
    interval_secs: u64,
    batch_size: i64,
) {
    let mut retry_ticker = interval(Duration::from_secs(interval_secs));
    let mut stale_ticker = interval(Duration::from_secs(STALE_CHECK_INTERVAL_SECS));

    info!(
        "Callback retry worker started (polling every {}s, batch {})",
        interval_secs, batch_size
    );

    loop {
        tokio::select! {
            _ = retry_ticker.tick() => {
                if let Err(e) = callback_uc.process_callback_retries(batch_size).await {
                    error!(error = %e, "Failed to process callback retries");
                }
            }
            _ = stale_ticker.tick() => {
                if let Err(e) = callback_uc.release_stale_retries(STALE_RETRY_THRESHOLD_SECS).await {
                    error!(error = %e, "Failed to release stale callback retries");
                }
            }
        }
    }
}
