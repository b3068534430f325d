use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::payment_callback::CallbackRetryRepoTrait,
    domain::entities::callback_retry::CallbackRetry,
};

const SELECT_COLS: &str = r#"
    id, payment_id, callback_data, status, retry_count, last_error,
    next_retry_at, created_at, updated_at
"#;

fn row_to_retry(row: sqlx::postgres::PgRow) -> CallbackRetry {
    CallbackRetry {
        id: row.get("id"),
        payment_id: row.get("payment_id"),
        callback_data: row.get("callback_data"),
        status: row.get("status"),
        retry_count: row.get("retry_count"),
        last_error: row.get("last_error"),
        next_retry_at: row.get("next_retry_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CallbackRetryRepoTrait for PostgresPersistence {
    async fn create(&self, retry: &CallbackRetry) -> AppResult<CallbackRetry> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO callback_retries (
                id, payment_id, callback_data, status, retry_count, last_error,
                next_retry_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(retry.id)
        .bind(retry.payment_id)
        .bind(&retry.callback_data)
        .bind(retry.status)
        .bind(retry.retry_count)
        .bind(&retry.last_error)
        .bind(retry.next_retry_at)
        .bind(retry.created_at)
        .bind(retry.updated_at)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_retry(row))
    }

    async fn get_pending_retries(&self, limit: i64) -> AppResult<Vec<CallbackRetry>> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE callback_retries
            SET status = 'processing', updated_at = (NOW() AT TIME ZONE 'UTC')
            WHERE id IN (
                SELECT id FROM callback_retries
                WHERE status = 'pending' AND next_retry_at <= (NOW() AT TIME ZONE 'UTC')
                ORDER BY next_retry_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_retry).collect())
    }

    async fn update(&self, retry: &CallbackRetry) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE callback_retries
            SET status = $2,
                retry_count = $3,
                last_error = $4,
                next_retry_at = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(retry.id)
        .bind(retry.status)
        .bind(retry.retry_count)
        .bind(&retry.last_error)
        .bind(retry.next_retry_at)
        .bind(retry.updated_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn release_stale(&self, threshold_secs: i64) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            UPDATE callback_retries
            SET status = 'pending',
                updated_at = (NOW() AT TIME ZONE 'UTC')
            WHERE status = 'processing'
              AND updated_at < (NOW() AT TIME ZONE 'UTC') - make_interval(secs => $1::double precision)
            "#,
        )
        .bind(threshold_secs)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() as i64)
    }
}
