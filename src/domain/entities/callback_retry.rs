use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a queued callback redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "callback_retry_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum CallbackRetryStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CallbackRetryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackRetryStatus::Pending => "pending",
            CallbackRetryStatus::Processing => "processing",
            CallbackRetryStatus::Completed => "completed",
            CallbackRetryStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallbackRetryStatus::Completed | CallbackRetryStatus::Failed
        )
    }
}

impl std::fmt::Display for CallbackRetryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A gateway callback that has to be processed again later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackRetry {
    pub id: Uuid,
    pub payment_id: Uuid,
    /// The original callback, serialized as JSON.
    pub callback_data: String,
    pub status: CallbackRetryStatus,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub next_retry_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CallbackRetry {
    pub fn new(payment_id: Uuid, callback_data: String, now: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            callback_data,
            status: CallbackRetryStatus::Pending,
            retry_count: 0,
            last_error: None,
            next_retry_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.status == CallbackRetryStatus::Pending && self.next_retry_at <= now
    }
}
