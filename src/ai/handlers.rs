use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    ai::dto::{AiMealResponse, ParseMealRequest, UpdateMealWithTextRequest},
    auth::AuthUser,
    days::dto::parse_date,
    error::AppResult,
    state::AppState,
};

pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/meals", post(parse_meal))
        .route("/ai/meals/:id", post(update_meal_with_text))
}

#[instrument(skip(state, body), fields(meal_type = %body.meal_type))]
pub async fn parse_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ParseMealRequest>,
) -> AppResult<(StatusCode, Json<AiMealResponse>)> {
    let date = body.date.as_deref().map(parse_date).transpose()?;
    let res = state
        .ai
        .parse_and_create(user_id, &body.text, body.meal_type, date)
        .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, body))]
pub async fn update_meal_with_text(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMealWithTextRequest>,
) -> AppResult<Json<AiMealResponse>> {
    let res = state.ai.parse_and_merge(user_id, id, &body.text).await?;
    Ok(Json(res))
}
