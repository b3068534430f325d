use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::payment::PaymentRepoTrait,
    domain::{
        entities::{
            callback_retry::{CallbackRetry, CallbackRetryStatus},
            payment::{Currency, Payment},
            payment_status::PaymentStatus,
        },
        services::payment_service::PaymentService,
    },
};

pub const DEFAULT_MAX_RETRY_ATTEMPTS: i32 = 10;
pub const STALE_RETRY_THRESHOLD_SECS: i64 = 300;

const LAST_ERROR_CAP: usize = 1024;

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait CallbackRetryRepoTrait: Send + Sync {
    async fn create(&self, retry: &CallbackRetry) -> AppResult<CallbackRetry>;

    /// Claims up to `limit` due Pending records, moving them to Processing.
    /// A record is handed to at most one caller.
    async fn get_pending_retries(&self, limit: i64) -> AppResult<Vec<CallbackRetry>>;

    async fn update(&self, retry: &CallbackRetry) -> AppResult<()>;

    /// Returns records stuck in Processing for longer than `threshold_secs`
    /// to Pending. Returns how many were released.
    async fn release_stale(&self, threshold_secs: i64) -> AppResult<i64>;
}

// ============================================================================
// Types
// ============================================================================

/// A gateway notification about one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub invoice_id: String,
    #[serde(default)]
    pub transaction_id: String,
    /// Minor units. Must equal the stored amount exactly.
    pub amount: i64,
    pub currency: Currency,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Kept verbatim for dispute resolution.
    #[serde(default)]
    pub raw_response: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackResult {
    /// False when the callback was a replay, lost a race, or was queued.
    pub processed: bool,
    /// True when processing failed transiently and the callback was queued.
    pub queued: bool,
    pub payment_id: Uuid,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryItemError {
    pub retry_id: Uuid,
    pub payment_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessRetriesResult {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<RetryItemError>,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct CallbackUseCases {
    payment_repo: Arc<dyn PaymentRepoTrait>,
    retry_repo: Arc<dyn CallbackRetryRepoTrait>,
    service: PaymentService,
    max_attempts: i32,
}

impl CallbackUseCases {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepoTrait>,
        retry_repo: Arc<dyn CallbackRetryRepoTrait>,
        service: PaymentService,
        max_attempts: i32,
    ) -> Self {
        Self {
            payment_repo,
            retry_repo,
            service,
            max_attempts: max_attempts.max(1),
        }
    }

    // ========================================================================
    // Callback Ingestion
    // ========================================================================

    /// Applies a gateway callback to its payment.
    ///
    /// Safe to replay: once a payment is final every further callback is a
    /// no-op returning `processed: false`.
    #[instrument(skip(self, callback), fields(invoice_id = %callback.invoice_id))]
    pub async fn handle_callback(&self, callback: &PaymentCallback) -> AppResult<CallbackResult> {
        let mut payment = self
            .payment_repo
            .get_by_invoice_id(&callback.invoice_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if callback.amount != payment.amount || callback.currency != payment.currency {
            warn!(
                payment_id = %payment.id,
                expected_amount = payment.amount,
                expected_currency = %payment.currency,
                received_amount = callback.amount,
                received_currency = %callback.currency,
                "Callback amount or currency does not match payment"
            );
            return Err(AppError::Validation(
                "callback amount or currency does not match the payment".into(),
            ));
        }

        if self.service.is_final_status(payment.status) {
            info!(
                payment_id = %payment.id,
                status = %payment.status,
                "Ignoring callback for payment in final status"
            );
            return Ok(not_processed(&payment));
        }

        let expected_status = payment.status;
        let mapped = self.service.map_gateway_status(&callback.status);
        if mapped != expected_status {
            self.service
                .validate_status_transition(expected_status, mapped)?;
        }

        let now = Utc::now().naive_utc();
        apply_callback(&mut payment, callback, mapped, now);

        if !self.payment_repo.update(&payment, expected_status).await? {
            info!(
                payment_id = %payment.id,
                "Payment changed concurrently, callback not applied"
            );
            let current = self
                .payment_repo
                .get_by_id(payment.id)
                .await?
                .unwrap_or(payment);
            return Ok(not_processed(&current));
        }

        info!(
            payment_id = %payment.id,
            from = %expected_status,
            to = %payment.status,
            "Callback applied"
        );

        Ok(CallbackResult {
            processed: true,
            queued: false,
            payment_id: payment.id,
            status: payment.status,
        })
    }

    /// Entry point for callbacks arriving over the network. Transient
    /// failures are queued for redelivery instead of being surfaced, so the
    /// gateway can be acknowledged. Anything else is returned to the caller.
    #[instrument(skip(self, callback), fields(invoice_id = %callback.invoice_id))]
    pub async fn ingest_callback(&self, callback: &PaymentCallback) -> AppResult<CallbackResult> {
        let err = match self.handle_callback(callback).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e),
        };

        warn!(error = %err, "Callback processing failed transiently, queueing retry");

        // Without the payment id there is nothing to key the retry on; let
        // the gateway redeliver.
        let payment = self
            .payment_repo
            .get_by_invoice_id(&callback.invoice_id)
            .await?
            .ok_or(err)?;

        self.enqueue_callback_retry(payment.id, callback).await?;

        Ok(CallbackResult {
            processed: false,
            queued: true,
            payment_id: payment.id,
            status: payment.status,
        })
    }

    // ========================================================================
    // Retry Queue
    // ========================================================================

    pub async fn enqueue_callback_retry(
        &self,
        payment_id: Uuid,
        callback: &PaymentCallback,
    ) -> AppResult<CallbackRetry> {
        let data = serde_json::to_string(callback)
            .map_err(|e| AppError::Internal(format!("failed to serialize callback: {}", e)))?;
        let retry = CallbackRetry::new(payment_id, data, Utc::now().naive_utc());
        let retry = self.retry_repo.create(&retry).await?;

        info!(retry_id = %retry.id, %payment_id, "Callback queued for retry");
        Ok(retry)
    }

    /// Redelivers up to `batch_size` due callbacks. One item's failure never
    /// stops the batch.
    #[instrument(skip(self))]
    pub async fn process_callback_retries(
        &self,
        batch_size: i64,
    ) -> AppResult<ProcessRetriesResult> {
        let retries = self.retry_repo.get_pending_retries(batch_size).await?;
        let mut result = ProcessRetriesResult::default();

        for mut retry in retries {
            result.processed += 1;
            let now = Utc::now().naive_utc();

            let callback: PaymentCallback = match serde_json::from_str(&retry.callback_data) {
                Ok(callback) => callback,
                Err(e) => {
                    let message = format!("malformed callback payload: {}", e);
                    warn!(retry_id = %retry.id, error = %message, "Dropping unreadable callback");
                    retry.retry_count += 1;
                    self.finish(&mut retry, CallbackRetryStatus::Failed, Some(&message), now)
                        .await;
                    result.failed += 1;
                    result.errors.push(RetryItemError {
                        retry_id: retry.id,
                        payment_id: retry.payment_id,
                        error: message,
                    });
                    continue;
                }
            };

            match self.handle_callback(&callback).await {
                Ok(outcome) => {
                    info!(
                        retry_id = %retry.id,
                        payment_id = %retry.payment_id,
                        applied = outcome.processed,
                        "Callback retry succeeded"
                    );
                    self.finish(&mut retry, CallbackRetryStatus::Completed, None, now)
                        .await;
                    result.succeeded += 1;
                }
                Err(e) => {
                    let message = e.to_string();
                    retry.retry_count += 1;
                    if retry.retry_count >= self.max_attempts {
                        error!(
                            retry_id = %retry.id,
                            payment_id = %retry.payment_id,
                            attempts = retry.retry_count,
                            error = %message,
                            "Callback retry abandoned"
                        );
                        self.finish(&mut retry, CallbackRetryStatus::Failed, Some(&message), now)
                            .await;
                    } else {
                        let delay = calculate_backoff_delay(retry.retry_count - 1);
                        retry.next_retry_at = now + Duration::seconds(delay);
                        warn!(
                            retry_id = %retry.id,
                            payment_id = %retry.payment_id,
                            attempts = retry.retry_count,
                            next_retry_at = %retry.next_retry_at,
                            error = %message,
                            "Callback retry failed, rescheduled"
                        );
                        self.finish(&mut retry, CallbackRetryStatus::Pending, Some(&message), now)
                            .await;
                    }
                    result.failed += 1;
                    result.errors.push(RetryItemError {
                        retry_id: retry.id,
                        payment_id: retry.payment_id,
                        error: message,
                    });
                }
            }
        }

        if result.processed > 0 {
            info!(
                processed = result.processed,
                succeeded = result.succeeded,
                failed = result.failed,
                "Processed callback retries"
            );
        }

        Ok(result)
    }

    pub async fn release_stale_retries(&self, threshold_secs: i64) -> AppResult<i64> {
        let released = self.retry_repo.release_stale(threshold_secs).await?;
        if released > 0 {
            warn!(released, "Released stale callback retries");
        }
        Ok(released)
    }

    // ========================================================================
    // Private Helpers
    // ========================================================================

    async fn finish(
        &self,
        retry: &mut CallbackRetry,
        status: CallbackRetryStatus,
        last_error: Option<&str>,
        now: NaiveDateTime,
    ) {
        retry.status = status;
        if let Some(message) = last_error {
            retry.last_error = Some(message.chars().take(LAST_ERROR_CAP).collect());
        }
        retry.updated_at = now;

        if let Err(e) = self.retry_repo.update(retry).await {
            // The record stays Processing; release_stale_retries returns it to the queue.
            error!(retry_id = %retry.id, error = %e, "Failed to record callback retry outcome");
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn not_processed(payment: &Payment) -> CallbackResult {
    CallbackResult {
        processed: false,
        queued: false,
        payment_id: payment.id,
        status: payment.status,
    }
}

fn apply_callback(
    payment: &mut Payment,
    callback: &PaymentCallback,
    status: PaymentStatus,
    now: NaiveDateTime,
) {
    if status == PaymentStatus::Completed && payment.status != PaymentStatus::Completed {
        payment.completed_at = Some(now);
    }
    payment.status = status;

    if !callback.transaction_id.trim().is_empty() {
        payment.gateway_transaction_id = Some(callback.transaction_id.trim().to_string());
    }
    set_if_present(&mut payment.card_mask, &callback.card_mask);
    set_if_present(&mut payment.approval_code, &callback.approval_code);
    set_if_present(&mut payment.error_code, &callback.error_code);
    set_if_present(&mut payment.error_message, &callback.error_message);

    payment.gateway_response = Some(serde_json::Value::Object(callback.raw_response.clone()));
    payment.updated_at = now;
}

fn set_if_present(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        *slot = Some(v.to_string());
    }
}

// ============================================================================
// Backoff Calculation
// ============================================================================

/// Seconds to wait before the next redelivery after `attempt_count` failures.
pub fn calculate_backoff_delay(attempt_count: i32) -> i64 {
    let base_delay: i64 = 30;
    let max_delay: i64 = 3_600;
    let exponential = base_delay.saturating_mul(4i64.saturating_pow(attempt_count.max(0) as u32));
    let capped = exponential.min(max_delay);
    let jitter = (rand::random::<u64>() % 10) as i64;
    capped + jitter
}
