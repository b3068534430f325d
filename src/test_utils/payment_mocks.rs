//! In-memory mock implementations for the payment repository traits.
//!
//! Conditional updates honour the expected-status check the same way the
//! Postgres adapter does, so race-loss paths can be exercised directly.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        payment::PaymentRepoTrait, payment_callback::CallbackRetryRepoTrait,
        receipt::ReceiptRepoTrait, saved_card::SavedCardRepoTrait,
    },
    domain::entities::{
        callback_retry::{CallbackRetry, CallbackRetryStatus},
        payment::Payment,
        payment_status::PaymentStatus,
        receipt::Receipt,
        saved_card::SavedCard,
    },
};

// ============================================================================
// InMemoryPaymentRepo
// ============================================================================

/// In-memory implementation of PaymentRepoTrait for testing.
#[derive(Default)]
pub struct InMemoryPaymentRepo {
    pub payments: Mutex<HashMap<Uuid, Payment>>,
    failing_ids: Mutex<HashSet<Uuid>>,
    concurrent_writes: Mutex<HashMap<Uuid, PaymentStatus>>,
}

impl InMemoryPaymentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payments(payments: Vec<Payment>) -> Self {
        let map: HashMap<Uuid, Payment> = payments.into_iter().map(|p| (p.id, p)).collect();
        Self {
            payments: Mutex::new(map),
            ..Default::default()
        }
    }

    /// Makes every write to `id` fail with a database error.
    pub fn fail_writes_for(&self, id: Uuid) {
        self.failing_ids.lock().unwrap().insert(id);
    }

    /// Simulates another writer: the next conditional write to `id` finds
    /// the stored row already moved to `status`.
    pub fn change_status_before_next_write(&self, id: Uuid, status: PaymentStatus) {
        self.concurrent_writes.lock().unwrap().insert(id, status);
    }

    pub fn get(&self, id: Uuid) -> Option<Payment> {
        self.payments.lock().unwrap().get(&id).cloned()
    }

    pub fn get_all(&self) -> Vec<Payment> {
        self.payments.lock().unwrap().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.payments.lock().unwrap().len()
    }

    fn check_writable(&self, id: Uuid) -> AppResult<()> {
        if self.failing_ids.lock().unwrap().contains(&id) {
            return Err(AppError::Database("connection reset".into()));
        }
        Ok(())
    }

    fn apply_concurrent_write(&self, payments: &mut HashMap<Uuid, Payment>, id: Uuid) {
        let Some(status) = self.concurrent_writes.lock().unwrap().remove(&id) else {
            return;
        };
        if let Some(stored) = payments.get_mut(&id) {
            stored.status = status;
            stored.updated_at = Utc::now().naive_utc();
        }
    }
}

#[async_trait]
impl PaymentRepoTrait for InMemoryPaymentRepo {
    async fn create(&self, payment: &Payment) -> AppResult<Payment> {
        let mut payments = self.payments.lock().unwrap();
        if payments
            .values()
            .any(|p| p.invoice_id == payment.invoice_id)
        {
            return Err(AppError::Validation(
                "A record with this value already exists".into(),
            ));
        }
        payments.insert(payment.id, payment.clone());
        Ok(payment.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.get(id))
    }

    async fn get_by_invoice_id(&self, invoice_id: &str) -> AppResult<Option<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .find(|p| p.invoice_id == invoice_id)
            .cloned())
    }

    async fn update(&self, payment: &Payment, expected_status: PaymentStatus) -> AppResult<bool> {
        self.check_writable(payment.id)?;
        let mut payments = self.payments.lock().unwrap();
        self.apply_concurrent_write(&mut payments, payment.id);
        match payments.get_mut(&payment.id) {
            Some(stored) if stored.status == expected_status => {
                *stored = payment.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_status: PaymentStatus,
        new_status: PaymentStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> AppResult<bool> {
        self.check_writable(id)?;
        let mut payments = self.payments.lock().unwrap();
        self.apply_concurrent_write(&mut payments, id);
        let Some(stored) = payments.get_mut(&id) else {
            return Ok(false);
        };
        if stored.status != expected_status {
            return Ok(false);
        }
        let now = Utc::now().naive_utc();
        stored.status = new_status;
        if let Some(code) = error_code {
            stored.error_code = Some(code.to_string());
        }
        if let Some(message) = error_message {
            stored.error_message = Some(message.to_string());
        }
        if new_status == PaymentStatus::Completed {
            stored.completed_at = Some(now);
        }
        stored.updated_at = now;
        Ok(true)
    }

    async fn list_by_status(&self, status: PaymentStatus) -> AppResult<Vec<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect())
    }

    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.member_id == member_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}

// ============================================================================
// InMemoryCallbackRetryRepo
// ============================================================================

/// In-memory implementation of CallbackRetryRepoTrait for testing.
#[derive(Default)]
pub struct InMemoryCallbackRetryRepo {
    pub retries: Mutex<HashMap<Uuid, CallbackRetry>>,
}

impl InMemoryCallbackRetryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(retries: Vec<CallbackRetry>) -> Self {
        let map: HashMap<Uuid, CallbackRetry> = retries.into_iter().map(|r| (r.id, r)).collect();
        Self {
            retries: Mutex::new(map),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<CallbackRetry> {
        self.retries.lock().unwrap().get(&id).cloned()
    }

    pub fn get_all(&self) -> Vec<CallbackRetry> {
        self.retries.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl CallbackRetryRepoTrait for InMemoryCallbackRetryRepo {
    async fn create(&self, retry: &CallbackRetry) -> AppResult<CallbackRetry> {
        self.retries
            .lock()
            .unwrap()
            .insert(retry.id, retry.clone());
        Ok(retry.clone())
    }

    async fn get_pending_retries(&self, limit: i64) -> AppResult<Vec<CallbackRetry>> {
        let now = Utc::now().naive_utc();
        let mut retries = self.retries.lock().unwrap();
        let mut due: Vec<Uuid> = retries
            .values()
            .filter(|r| r.is_due(now))
            .map(|r| r.id)
            .collect();
        due.sort_by_key(|id| retries[id].next_retry_at);
        due.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            if let Some(retry) = retries.get_mut(&id) {
                retry.status = CallbackRetryStatus::Processing;
                retry.updated_at = now;
                claimed.push(retry.clone());
            }
        }
        Ok(claimed)
    }

    async fn update(&self, retry: &CallbackRetry) -> AppResult<()> {
        let mut retries = self.retries.lock().unwrap();
        match retries.get_mut(&retry.id) {
            Some(stored) => {
                *stored = retry.clone();
                Ok(())
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn release_stale(&self, threshold_secs: i64) -> AppResult<i64> {
        let cutoff = Utc::now().naive_utc() - Duration::seconds(threshold_secs);
        let mut released = 0;
        for retry in self.retries.lock().unwrap().values_mut() {
            if retry.status == CallbackRetryStatus::Processing && retry.updated_at < cutoff {
                retry.status = CallbackRetryStatus::Pending;
                released += 1;
            }
        }
        Ok(released)
    }
}

// ============================================================================
// InMemorySavedCardRepo
// ============================================================================

/// In-memory implementation of SavedCardRepoTrait for testing.
#[derive(Default)]
pub struct InMemorySavedCardRepo {
    pub cards: Mutex<HashMap<Uuid, SavedCard>>,
}

impl InMemorySavedCardRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(cards: Vec<SavedCard>) -> Self {
        let map: HashMap<Uuid, SavedCard> = cards.into_iter().map(|c| (c.id, c)).collect();
        Self {
            cards: Mutex::new(map),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<SavedCard> {
        self.cards.lock().unwrap().get(&id).cloned()
    }

    pub fn get_all(&self) -> Vec<SavedCard> {
        self.cards.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl SavedCardRepoTrait for InMemorySavedCardRepo {
    async fn create(&self, card: &SavedCard) -> AppResult<SavedCard> {
        let mut cards = self.cards.lock().unwrap();
        if cards
            .values()
            .any(|c| c.is_active && c.card_token == card.card_token)
        {
            return Err(AppError::Validation(
                "A record with this value already exists".into(),
            ));
        }
        cards.insert(card.id, card.clone());
        Ok(card.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SavedCard>> {
        Ok(self.get(id))
    }

    async fn get_by_card_token(&self, card_token: &str) -> AppResult<Option<SavedCard>> {
        Ok(self
            .cards
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.card_token == card_token)
            .max_by_key(|c| (c.is_active, c.created_at))
            .cloned())
    }

    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<SavedCard>> {
        let mut cards: Vec<SavedCard> = self
            .cards
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.member_id == member_id && c.is_active)
            .cloned()
            .collect();
        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cards)
    }

    async fn set_as_default(&self, member_id: Uuid, card_id: Uuid) -> AppResult<()> {
        let mut cards = self.cards.lock().unwrap();
        if !cards
            .get(&card_id)
            .is_some_and(|c| c.member_id == member_id && c.is_active)
        {
            return Err(AppError::NotFound);
        }
        for card in cards.values_mut().filter(|c| c.member_id == member_id) {
            card.is_default = card.id == card_id;
        }
        Ok(())
    }

    async fn deactivate(&self, card_id: Uuid) -> AppResult<()> {
        let mut cards = self.cards.lock().unwrap();
        let card = cards.get_mut(&card_id).ok_or(AppError::NotFound)?;
        card.is_active = false;
        card.is_default = false;
        Ok(())
    }
}

// ============================================================================
// InMemoryReceiptRepo
// ============================================================================

/// In-memory implementation of ReceiptRepoTrait for testing.
#[derive(Default)]
pub struct InMemoryReceiptRepo {
    pub receipts: Mutex<HashMap<Uuid, Receipt>>,
}

impl InMemoryReceiptRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_all(&self) -> Vec<Receipt> {
        self.receipts.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ReceiptRepoTrait for InMemoryReceiptRepo {
    async fn create(&self, receipt: &Receipt) -> AppResult<Receipt> {
        let mut receipts = self.receipts.lock().unwrap();
        if let Some(existing) = receipts.values().find(|r| r.payment_id == receipt.payment_id) {
            return Ok(existing.clone());
        }
        receipts.insert(receipt.id, receipt.clone());
        Ok(receipt.clone())
    }

    async fn get_by_payment_id(&self, payment_id: Uuid) -> AppResult<Option<Receipt>> {
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .values()
            .find(|r| r.payment_id == payment_id)
            .cloned())
    }

    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<Receipt>> {
        let mut receipts: Vec<Receipt> = self
            .receipts
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.member_id == member_id)
            .cloned()
            .collect();
        receipts.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(receipts)
    }
}
