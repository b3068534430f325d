use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::validators::{is_valid_card_mask, is_valid_card_token, is_valid_expiry_month},
    domain::entities::saved_card::SavedCard,
};

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait SavedCardRepoTrait: Send + Sync {
    async fn create(&self, card: &SavedCard) -> AppResult<SavedCard>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SavedCard>>;

    async fn get_by_card_token(&self, card_token: &str) -> AppResult<Option<SavedCard>>;

    /// Active cards only.
    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<SavedCard>>;

    /// Makes `card_id` the member's only default card, atomically.
    async fn set_as_default(&self, member_id: Uuid, card_id: Uuid) -> AppResult<()>;

    /// Soft delete: clears `is_active` and `is_default`.
    async fn deactivate(&self, card_id: Uuid) -> AppResult<()>;
}

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct SaveCardInput {
    pub member_id: Uuid,
    pub card_token: String,
    pub card_mask: String,
    pub card_type: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct SavedCardUseCases {
    card_repo: Arc<dyn SavedCardRepoTrait>,
}

impl SavedCardUseCases {
    pub fn new(card_repo: Arc<dyn SavedCardRepoTrait>) -> Self {
        Self { card_repo }
    }

    /// Saves a tokenized card. Saving a token the member already has returns
    /// the stored card unchanged.
    #[instrument(skip(self, input), fields(member_id = %input.member_id))]
    pub async fn save_card(&self, input: SaveCardInput) -> AppResult<SavedCard> {
        let card_token = input.card_token.trim();
        let card_mask = input.card_mask.trim();

        if !is_valid_card_token(card_token) {
            return Err(AppError::Validation("invalid card token".into()));
        }
        if !is_valid_card_mask(card_mask) {
            return Err(AppError::Validation("invalid card mask".into()));
        }
        if !is_valid_expiry_month(input.expiry_month) {
            return Err(AppError::Validation("invalid expiry month".into()));
        }

        if let Some(existing) = self.card_repo.get_by_card_token(card_token).await? {
            if existing.is_owned_by(input.member_id) && existing.is_active {
                return Ok(existing);
            }
            if !existing.is_owned_by(input.member_id) {
                warn!(
                    member_id = %input.member_id,
                    "Card token already registered to another member"
                );
                return Err(AppError::Validation("card cannot be saved".into()));
            }
            // A deactivated card with the same token falls through and is
            // re-saved as a new record.
        }

        let now = Utc::now().naive_utc();
        let card = SavedCard {
            id: Uuid::new_v4(),
            member_id: input.member_id,
            card_token: card_token.to_string(),
            card_mask: card_mask.to_string(),
            card_type: input.card_type.trim().to_uppercase(),
            expiry_month: input.expiry_month,
            expiry_year: input.expiry_year,
            is_default: false,
            is_active: true,
            created_at: now,
        };

        if card.is_expired(now.date()) {
            return Err(AppError::Validation("card has expired".into()));
        }

        let is_first = self
            .card_repo
            .list_by_member_id(input.member_id)
            .await?
            .is_empty();
        let card = SavedCard {
            is_default: is_first,
            ..card
        };

        let card = self.card_repo.create(&card).await?;
        info!(card_id = %card.id, is_default = card.is_default, "Card saved");
        Ok(card)
    }

    /// Active cards, default first, then newest first.
    pub async fn list_saved_cards(&self, member_id: Uuid) -> AppResult<Vec<SavedCard>> {
        let mut cards: Vec<SavedCard> = self
            .card_repo
            .list_by_member_id(member_id)
            .await?
            .into_iter()
            .filter(|c| c.is_active)
            .collect();
        cards.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(cards)
    }

    #[instrument(skip(self))]
    pub async fn set_default_card(&self, member_id: Uuid, card_id: Uuid) -> AppResult<SavedCard> {
        let card = self.load_owned(member_id, card_id).await?;

        if !card.can_be_used(Utc::now().date_naive()) {
            return Err(AppError::Validation(
                "expired or inactive cards cannot be the default".into(),
            ));
        }

        self.card_repo.set_as_default(member_id, card_id).await?;
        info!(%card_id, "Default card changed");

        Ok(SavedCard {
            is_default: true,
            ..card
        })
    }

    /// Soft-deletes a card. If it was the default, the newest remaining
    /// usable card takes over.
    #[instrument(skip(self))]
    pub async fn delete_saved_card(&self, member_id: Uuid, card_id: Uuid) -> AppResult<()> {
        let card = self.load_owned(member_id, card_id).await?;
        if !card.is_active {
            return Err(AppError::NotFound);
        }

        self.card_repo.deactivate(card_id).await?;
        info!(%card_id, "Card removed");

        if card.is_default {
            let today = Utc::now().date_naive();
            let successor = self
                .card_repo
                .list_by_member_id(member_id)
                .await?
                .into_iter()
                .filter(|c| c.id != card_id && c.can_be_used(today))
                .max_by_key(|c| c.created_at);

            if let Some(next) = successor {
                self.card_repo.set_as_default(member_id, next.id).await?;
                info!(card_id = %next.id, "Default card reassigned");
            }
        }

        Ok(())
    }

    async fn load_owned(&self, member_id: Uuid, card_id: Uuid) -> AppResult<SavedCard> {
        let card = self
            .card_repo
            .get_by_id(card_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !card.is_owned_by(member_id) {
            return Err(AppError::NotFound);
        }
        Ok(card)
    }
}
