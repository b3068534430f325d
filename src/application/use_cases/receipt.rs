use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::payment::{PaymentRepoTrait, Requester},
    domain::entities::{payment_status::PaymentStatus, receipt::Receipt},
};

#[async_trait]
pub trait ReceiptRepoTrait: Send + Sync {
    /// Inserts the receipt unless one already exists for its payment, and
    /// returns whichever row is stored.
    async fn create(&self, receipt: &Receipt) -> AppResult<Receipt>;

    async fn get_by_payment_id(&self, payment_id: Uuid) -> AppResult<Option<Receipt>>;

    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<Receipt>>;
}

#[derive(Clone)]
pub struct ReceiptUseCases {
    receipt_repo: Arc<dyn ReceiptRepoTrait>,
    payment_repo: Arc<dyn PaymentRepoTrait>,
}

impl ReceiptUseCases {
    pub fn new(
        receipt_repo: Arc<dyn ReceiptRepoTrait>,
        payment_repo: Arc<dyn PaymentRepoTrait>,
    ) -> Self {
        Self {
            receipt_repo,
            payment_repo,
        }
    }

    /// Returns the stored receipt for a payment, issuing it on first request.
    /// Only completed payments get a new receipt.
    #[instrument(skip(self))]
    pub async fn generate_receipt(
        &self,
        payment_id: Uuid,
        requester: &Requester,
    ) -> AppResult<Receipt> {
        let payment = self
            .payment_repo
            .get_by_id(payment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !requester.is_admin && !payment.is_owned_by(requester.member_id) {
            return Err(AppError::NotFound);
        }

        // Issued receipts are immutable and outlive later refunds.
        if let Some(existing) = self.receipt_repo.get_by_payment_id(payment_id).await? {
            return Ok(existing);
        }

        if payment.status != PaymentStatus::Completed {
            return Err(AppError::InvalidPaymentStatus(format!(
                "receipts are only issued for completed payments (status is {})",
                payment.status
            )));
        }

        let receipt = Receipt::from_payment(&payment, Utc::now().naive_utc());
        let receipt = self.receipt_repo.create(&receipt).await?;
        info!(
            receipt_id = %receipt.id,
            receipt_number = %receipt.receipt_number,
            "Receipt issued"
        );
        Ok(receipt)
    }

    pub async fn list_receipts(&self, member_id: Uuid) -> AppResult<Vec<Receipt>> {
        self.receipt_repo.list_by_member_id(member_id).await
    }
}
