use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    days::dto::{parse_date, DaySummary, UpdateDayRequest},
    days::repo_types::{DayEntry, DayEntryPatch},
    error::AppResult,
    state::AppState,
};

pub fn day_routes() -> Router<AppState> {
    Router::new().route("/days/:date", get(get_day).patch(update_day))
}

#[instrument(skip(state))]
pub async fn get_day(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> AppResult<Json<DaySummary>> {
    let date = parse_date(&date)?;
    let summary = state.days.get_summary(user_id, date).await?;
    Ok(Json(summary))
}

#[instrument(skip(state, body))]
pub async fn update_day(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
    Json(body): Json<UpdateDayRequest>,
) -> AppResult<Json<DayEntry>> {
    let date = parse_date(&date)?;
    let patch = DayEntryPatch {
        target_kcal: body.target_kcal,
        notes: body.notes,
    };
    let day = state.days.update(user_id, date, patch).await?;
    Ok(Json(day))
}
