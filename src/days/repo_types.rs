use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Daily aggregation root for one user's calendar date.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DayEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub target_kcal: Option<i32>,
    pub consumed_kcal: i32,
    pub consumed_fiber: f64,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct DayEntryPatch {
    pub target_kcal: Option<i32>,
    pub notes: Option<String>,
}
