use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

/// A tokenized card a member saved for later payments. The raw PAN never
/// reaches this service; `card_token` is the gateway's reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedCard {
    pub id: Uuid,
    pub member_id: Uuid,
    #[serde(skip_serializing)]
    pub card_token: String,
    pub card_mask: String,
    pub card_type: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl SavedCard {
    /// A card stays valid through the last day of its expiry month.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        let (year, month) = (today.year(), today.month() as i32);
        self.expiry_year < year || (self.expiry_year == year && self.expiry_month < month)
    }

    pub fn can_be_used(&self, today: NaiveDate) -> bool {
        self.is_active && !self.is_expired(today)
    }

    pub fn is_owned_by(&self, member_id: Uuid) -> bool {
        self.member_id == member_id
    }
}
