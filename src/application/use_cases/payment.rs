use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        AuthTokenRequest, GatewayConfig, GatewayTransaction, PaymentGatewayPort,
    },
    domain::{
        entities::{
            payment::{Currency, Payment, PaymentType},
            payment_status::PaymentStatus,
        },
        services::payment_service::PaymentService,
    },
};

// ============================================================================
// Constants
// ============================================================================

/// Completed payments can be refunded for this many days after settlement.
pub const REFUND_WINDOW_DAYS: i64 = 180;

pub const ERROR_CODE_GATEWAY: &str = "GATEWAY_ERROR";
pub const ERROR_CODE_EXPIRED: &str = "EXPIRED";
pub const ERROR_CODE_CANCELLED: &str = "CANCELLED_BY_MEMBER";

// ============================================================================
// Repository Traits
// ============================================================================

/// Payment persistence.
///
/// `update` and `update_status` are conditional: they only write when the
/// stored status still equals `expected_status` and report whether they did.
/// That compare-and-swap is what keeps concurrent callbacks, admin actions
/// and sweep jobs from double-applying a transition.
#[async_trait]
pub trait PaymentRepoTrait: Send + Sync {
    async fn create(&self, payment: &Payment) -> AppResult<Payment>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>>;

    async fn get_by_invoice_id(&self, invoice_id: &str) -> AppResult<Option<Payment>>;

    /// Persists every mutable field of `payment` (status, gateway details,
    /// error fields, refund amount, timestamps).
    async fn update(&self, payment: &Payment, expected_status: PaymentStatus) -> AppResult<bool>;

    /// Moves a payment to `new_status`, recording optional error details.
    /// Sets `completed_at` when moving to Completed.
    async fn update_status(
        &self,
        id: Uuid,
        expected_status: PaymentStatus,
        new_status: PaymentStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> AppResult<bool>;

    async fn list_by_status(&self, status: PaymentStatus) -> AppResult<Vec<Payment>>;

    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<Payment>>;
}

// ============================================================================
// Input / Output Types
// ============================================================================

/// Who is asking. Non-admins only see their own payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub member_id: Uuid,
    pub is_admin: bool,
}

impl Requester {
    pub fn member(member_id: Uuid) -> Self {
        Self {
            member_id,
            is_admin: false,
        }
    }

    pub fn admin(member_id: Uuid) -> Self {
        Self {
            member_id,
            is_admin: true,
        }
    }

    fn can_access(&self, payment: &Payment) -> bool {
        self.is_admin || payment.is_owned_by(self.member_id)
    }
}

#[derive(Debug, Clone)]
pub struct InitiatePaymentInput {
    pub member_id: Uuid,
    pub amount: i64,
    pub currency: Currency,
    pub payment_type: PaymentType,
    pub related_entity_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutParams {
    pub terminal: String,
    pub back_link: String,
    pub post_link: String,
    pub widget_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatePaymentResult {
    pub payment_id: Uuid,
    pub invoice_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub auth_token: String,
    pub checkout: CheckoutParams,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct RefundPaymentInput {
    pub payment_id: Uuid,
    pub requester: Requester,
    /// Partial refund in minor units. `None` refunds the full amount.
    pub refund_amount: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpireError {
    pub payment_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpirePaymentsResult {
    /// Expired candidates considered in this run (after the batch cutoff).
    pub examined: usize,
    pub expired: usize,
    /// Candidates another writer moved first.
    pub skipped: usize,
    pub errors: Vec<ExpireError>,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PaymentUseCases {
    payment_repo: Arc<dyn PaymentRepoTrait>,
    gateway: Arc<dyn PaymentGatewayPort>,
    gateway_config: Arc<dyn GatewayConfig>,
    service: PaymentService,
}

impl PaymentUseCases {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepoTrait>,
        gateway: Arc<dyn PaymentGatewayPort>,
        gateway_config: Arc<dyn GatewayConfig>,
        service: PaymentService,
    ) -> Self {
        Self {
            payment_repo,
            gateway,
            gateway_config,
            service,
        }
    }

    // ========================================================================
    // Initiate
    // ========================================================================

    /// Creates a Pending payment and obtains a checkout token for it.
    ///
    /// If the gateway refuses, the freshly created payment is moved to Failed
    /// before the error is returned, so nothing is left Pending without a way
    /// to complete.
    #[instrument(skip(self), fields(member_id = %input.member_id))]
    pub async fn initiate_payment(
        &self,
        input: InitiatePaymentInput,
    ) -> AppResult<InitiatePaymentResult> {
        self.service.validate_amount(input.amount, input.currency)?;

        let now = Utc::now().naive_utc();
        let payment = self.service.new_pending_payment(
            input.member_id,
            input.amount,
            input.currency,
            input.payment_type,
            input.related_entity_id,
            now,
        );
        self.service.validate(&payment)?;

        let payment = self.payment_repo.create(&payment).await?;

        let request = AuthTokenRequest {
            invoice_id: payment.invoice_id.clone(),
            amount: payment.amount_in_major_units(),
            currency: payment.currency,
        };

        let auth_token = match self.gateway.get_auth_token(&request).await {
            Ok(token) => token,
            Err(e) => {
                error!(
                    payment_id = %payment.id,
                    invoice_id = %payment.invoice_id,
                    error = %e,
                    "Gateway refused auth token, failing payment"
                );
                self.compensate_to_failed(&payment, ERROR_CODE_GATEWAY, &e.to_string())
                    .await;
                return Err(into_external(e));
            }
        };

        info!(
            payment_id = %payment.id,
            invoice_id = %payment.invoice_id,
            amount = payment.amount,
            currency = %payment.currency,
            "Payment initiated"
        );

        Ok(InitiatePaymentResult {
            payment_id: payment.id,
            invoice_id: payment.invoice_id,
            amount: payment.amount,
            currency: payment.currency,
            auth_token,
            checkout: CheckoutParams {
                terminal: self.gateway_config.terminal().to_string(),
                back_link: self.gateway_config.back_link().to_string(),
                post_link: self.gateway_config.post_link().to_string(),
                widget_url: self.gateway_config.widget_url().to_string(),
            },
            expires_at: payment.expires_at,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_payment(&self, payment_id: Uuid, requester: &Requester) -> AppResult<Payment> {
        self.load_for(payment_id, requester).await
    }

    pub async fn list_member_payments(&self, member_id: Uuid) -> AppResult<Vec<Payment>> {
        self.payment_repo.list_by_member_id(member_id).await
    }

    // ========================================================================
    // Verify
    // ========================================================================

    /// Reconciles a payment with the gateway and returns the best-known state.
    ///
    /// Verification is advisory: gateway failures are logged and the stored
    /// payment is returned unchanged.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        payment_id: Uuid,
        requester: &Requester,
    ) -> AppResult<Payment> {
        let mut payment = self.load_for(payment_id, requester).await?;
        let now = Utc::now().naive_utc();

        if payment.status == PaymentStatus::Pending && self.service.is_expired(&payment, now) {
            info!(payment_id = %payment.id, "Payment expired before verification");
            self.payment_repo
                .update_status(
                    payment.id,
                    PaymentStatus::Pending,
                    PaymentStatus::Failed,
                    Some(ERROR_CODE_EXPIRED),
                    Some("payment expired before completion"),
                )
                .await?;
            return self.reload(payment.id).await;
        }

        if !payment.status.is_updatable() {
            return Ok(payment);
        }

        let response = match self.gateway.check_payment_status(&payment.invoice_id).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    payment_id = %payment.id,
                    invoice_id = %payment.invoice_id,
                    error = %e,
                    "Gateway status check failed, returning stored state"
                );
                return Ok(payment);
            }
        };

        let expected_status = payment.status;
        let mapped = self.service.map_gateway_status(&response.transaction.status);
        let mut changed = false;

        if mapped != payment.status {
            match self.service.validate_status_transition(payment.status, mapped) {
                Ok(()) => {
                    payment.status = mapped;
                    if mapped == PaymentStatus::Completed {
                        payment.completed_at = Some(now);
                    }
                    changed = true;
                }
                Err(violation) => {
                    warn!(
                        payment_id = %payment.id,
                        error = %violation,
                        "Ignoring gateway status that is not a valid transition"
                    );
                }
            }
        }

        changed |= reconcile_gateway_fields(&mut payment, &response.transaction);

        if !changed {
            return Ok(payment);
        }

        payment.gateway_status_response = Some(response.raw);
        payment.updated_at = now;

        if self.payment_repo.update(&payment, expected_status).await? {
            info!(
                payment_id = %payment.id,
                from = %expected_status,
                to = %payment.status,
                "Payment reconciled with gateway"
            );
            Ok(payment)
        } else {
            // Someone else moved it first; report what they stored.
            self.reload(payment.id).await
        }
    }

    // ========================================================================
    // Cancel
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn cancel_payment(
        &self,
        payment_id: Uuid,
        member_id: Uuid,
        reason: &str,
    ) -> AppResult<Payment> {
        let payment = self
            .load_for(payment_id, &Requester::member(member_id))
            .await?;

        match payment.status {
            PaymentStatus::Completed => {
                return Err(AppError::InvalidPaymentStatus(
                    "completed payments must be refunded, not cancelled".into(),
                ));
            }
            PaymentStatus::Cancelled => {
                return Err(AppError::AlreadyProcessed(
                    "payment is already cancelled".into(),
                ));
            }
            PaymentStatus::Refunded => {
                return Err(AppError::InvalidPaymentStatus(
                    "refunded payments cannot be cancelled".into(),
                ));
            }
            _ => {}
        }

        self.service
            .validate_status_transition(payment.status, PaymentStatus::Cancelled)?;

        let reason = reason.trim();
        let reason = if reason.is_empty() {
            "cancelled by member"
        } else {
            reason
        };

        let updated = self
            .payment_repo
            .update_status(
                payment.id,
                payment.status,
                PaymentStatus::Cancelled,
                Some(ERROR_CODE_CANCELLED),
                Some(reason),
            )
            .await?;

        if !updated {
            return Err(AppError::AlreadyProcessed(
                "payment changed while it was being cancelled".into(),
            ));
        }

        info!(payment_id = %payment.id, "Payment cancelled");
        self.reload(payment.id).await
    }

    // ========================================================================
    // Refund
    // ========================================================================

    /// Refunds a completed payment, fully or partially.
    ///
    /// The gateway is asked first. The local status only moves to Refunded
    /// once the gateway confirms, so a failed gateway call leaves the payment
    /// Completed.
    #[instrument(skip(self), fields(payment_id = %input.payment_id))]
    pub async fn refund_payment(&self, input: RefundPaymentInput) -> AppResult<Payment> {
        let mut payment = self.load_for(input.payment_id, &input.requester).await?;

        if payment.status != PaymentStatus::Completed {
            return Err(AppError::InvalidPaymentStatus(format!(
                "only completed payments can be refunded (status is {})",
                payment.status
            )));
        }

        let now = Utc::now().naive_utc();
        if now - payment.settled_at() > Duration::days(REFUND_WINDOW_DAYS) {
            return Err(AppError::InvalidPaymentStatus(format!(
                "refund window of {} days has passed",
                REFUND_WINDOW_DAYS
            )));
        }

        let refund_amount = match input.refund_amount {
            None => payment.amount,
            Some(amount) if amount > 0 && amount <= payment.amount => amount,
            Some(amount) => {
                return Err(AppError::Validation(format!(
                    "refund amount {} must be between 1 and {}",
                    amount, payment.amount
                )));
            }
        };

        if let Some(transaction_id) = payment
            .gateway_transaction_id
            .as_deref()
            .filter(|id| !id.is_empty())
        {
            let partial = (refund_amount != payment.amount)
                .then(|| payment.currency.to_major_units(refund_amount));

            // payment.id doubles as the gateway-side idempotency key.
            self.gateway
                .refund_payment(transaction_id, partial, payment.id)
                .await
                .map_err(|e| {
                    error!(
                        payment_id = %payment.id,
                        error = %e,
                        "Gateway refund failed, payment left unchanged"
                    );
                    into_external(e)
                })?;
        }

        payment.status = PaymentStatus::Refunded;
        payment.refunded_amount = Some(refund_amount);
        payment.updated_at = now;

        if !self
            .payment_repo
            .update(&payment, PaymentStatus::Completed)
            .await?
        {
            error!(
                payment_id = %payment.id,
                refund_amount,
                "Refund confirmed by gateway but payment changed concurrently"
            );
            return Err(AppError::AlreadyProcessed(
                "payment changed while it was being refunded".into(),
            ));
        }

        info!(
            payment_id = %payment.id,
            refund_amount,
            partial = refund_amount != payment.amount,
            "Payment refunded"
        );
        Ok(payment)
    }

    // ========================================================================
    // Expiry Sweep (called by background job)
    // ========================================================================

    /// Fails every Pending or Processing payment whose deadline has passed.
    ///
    /// Expired payments leave the status filter, so running this twice over
    /// the same data expires nothing the second time.
    #[instrument(skip(self))]
    pub async fn expire_payments(
        &self,
        batch_size: Option<usize>,
    ) -> AppResult<ExpirePaymentsResult> {
        let now = Utc::now().naive_utc();

        let mut candidates = Vec::new();
        for status in [PaymentStatus::Pending, PaymentStatus::Processing] {
            candidates.extend(self.payment_repo.list_by_status(status).await?);
        }
        candidates.retain(|p| self.service.is_expired(p, now));
        candidates.sort_by_key(|p| p.expires_at);
        if let Some(limit) = batch_size {
            candidates.truncate(limit);
        }

        let mut result = ExpirePaymentsResult {
            examined: candidates.len(),
            ..Default::default()
        };

        for payment in candidates {
            match self
                .payment_repo
                .update_status(
                    payment.id,
                    payment.status,
                    PaymentStatus::Failed,
                    Some(ERROR_CODE_EXPIRED),
                    Some("payment expired before completion"),
                )
                .await
            {
                Ok(true) => result.expired += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => {
                    error!(payment_id = %payment.id, error = %e, "Failed to expire payment");
                    result.errors.push(ExpireError {
                        payment_id: payment.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if result.expired > 0 || !result.errors.is_empty() {
            info!(
                expired = result.expired,
                skipped = result.skipped,
                errors = result.errors.len(),
                "Expired stale payments"
            );
        }

        Ok(result)
    }

    // ========================================================================
    // Private Helpers
    // ========================================================================

    /// Loads a payment the requester may see. A payment owned by someone else
    /// is reported as missing so its existence is not revealed.
    async fn load_for(&self, payment_id: Uuid, requester: &Requester) -> AppResult<Payment> {
        let payment = self
            .payment_repo
            .get_by_id(payment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !requester.can_access(&payment) {
            return Err(AppError::NotFound);
        }
        Ok(payment)
    }

    async fn reload(&self, payment_id: Uuid) -> AppResult<Payment> {
        self.payment_repo
            .get_by_id(payment_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn compensate_to_failed(&self, payment: &Payment, code: &str, message: &str) {
        match self
            .payment_repo
            .update_status(
                payment.id,
                PaymentStatus::Pending,
                PaymentStatus::Failed,
                Some(code),
                Some(message),
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                payment_id = %payment.id,
                "Payment left Pending before compensation could run"
            ),
            Err(e) => error!(
                payment_id = %payment.id,
                error = %e,
                "Failed to compensate payment to Failed; expiry sweep will pick it up"
            ),
        }
    }
}

// ============================================================================
// Gateway Field Reconciliation
// ============================================================================

/// Copies gateway-reported optional fields onto the payment, filling only
/// fields that are still empty. A value already stored is never replaced,
/// so a later, less complete gateway response cannot erase confirmed data.
/// Returns whether anything changed.
pub fn reconcile_gateway_fields(payment: &mut Payment, transaction: &GatewayTransaction) -> bool {
    let mut changed = false;
    changed |= fill_if_empty(
        &mut payment.gateway_transaction_id,
        &transaction.id,
        "gateway_transaction_id",
        payment.id,
    );
    changed |= fill_if_empty(
        &mut payment.card_mask,
        &transaction.card_mask,
        "card_mask",
        payment.id,
    );
    changed |= fill_if_empty(
        &mut payment.approval_code,
        &transaction.approval_code,
        "approval_code",
        payment.id,
    );
    changed
}

fn fill_if_empty(slot: &mut Option<String>, reported: &str, field: &str, payment_id: Uuid) -> bool {
    let reported = reported.trim();
    if reported.is_empty() {
        return false;
    }
    match slot.as_deref() {
        Some(existing) if !existing.is_empty() => {
            if existing != reported {
                warn!(
                    %payment_id,
                    field,
                    "Gateway reported a different value for a confirmed field, keeping stored value"
                );
            }
            false
        }
        _ => {
            *slot = Some(reported.to_string());
            true
        }
    }
}

fn into_external(e: AppError) -> AppError {
    match e {
        AppError::External(_) => e,
        other => AppError::External(other.to_string()),
    }
}
