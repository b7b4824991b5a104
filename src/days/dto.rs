use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date};

use crate::days::repo_types::DayEntry;
use crate::error::{AppError, AppResult};
use crate::meals::repo_types::Meal;

#[derive(Debug, Serialize)]
pub struct DaySummary {
    pub day: DayEntry,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDayRequest {
    pub target_kcal: Option<i32>,
    pub notes: Option<String>,
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> AppResult<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(|_| {
        AppError::bad_request("Invalid date").with_extension("date", "expected YYYY-MM-DD")
    })
}
