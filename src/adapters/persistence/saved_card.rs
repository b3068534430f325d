use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::saved_card::SavedCardRepoTrait,
    domain::entities::saved_card::SavedCard,
};

const SELECT_COLS: &str = r#"
    id, member_id, card_token, card_mask, card_type, expiry_month, expiry_year,
    is_default, is_active, created_at
"#;

fn row_to_card(row: sqlx::postgres::PgRow) -> SavedCard {
    SavedCard {
        id: row.get("id"),
        member_id: row.get("member_id"),
        card_token: row.get("card_token"),
        card_mask: row.get("card_mask"),
        card_type: row.get("card_type"),
        expiry_month: row.get("expiry_month"),
        expiry_year: row.get("expiry_year"),
        is_default: row.get("is_default"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl SavedCardRepoTrait for PostgresPersistence {
    async fn create(&self, card: &SavedCard) -> AppResult<SavedCard> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO saved_cards (
                id, member_id, card_token, card_mask, card_type, expiry_month, expiry_year,
                is_default, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(card.id)
        .bind(card.member_id)
        .bind(&card.card_token)
        .bind(&card.card_mask)
        .bind(&card.card_type)
        .bind(card.expiry_month)
        .bind(card.expiry_year)
        .bind(card.is_default)
        .bind(card.is_active)
        .bind(card.created_at)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_card(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SavedCard>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM saved_cards WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_card))
    }

    async fn get_by_card_token(&self, card_token: &str) -> AppResult<Option<SavedCard>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM saved_cards
            WHERE card_token = $1
            ORDER BY is_active DESC, created_at DESC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(card_token)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_card))
    }

    async fn list_by_member_id(&self, member_id: Uuid) -> AppResult<Vec<SavedCard>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM saved_cards
            WHERE member_id = $1 AND is_active
            ORDER BY created_at DESC
            "#,
            SELECT_COLS
        ))
        .bind(member_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_card).collect())
    }

    async fn set_as_default(&self, member_id: Uuid, card_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        // Clear first so the partial unique index on (member_id) WHERE is_default holds.
        sqlx::query(
            "UPDATE saved_cards SET is_default = FALSE WHERE member_id = $1 AND is_default",
        )
        .bind(member_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let result = sqlx::query(
            r#"
            UPDATE saved_cards SET is_default = TRUE
            WHERE id = $1 AND member_id = $2 AND is_active
            "#,
        )
        .bind(card_id)
        .bind(member_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::from)?;
            return Err(AppError::NotFound);
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    async fn deactivate(&self, card_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE saved_cards SET is_active = FALSE, is_default = FALSE WHERE id = $1",
        )
        .bind(card_id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
