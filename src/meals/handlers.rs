use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    days::dto::parse_date,
    error::{AppError, AppResult},
    meals::dto::{
        to_new_items, AddItemsRequest, CreateMealRequest, RemoveProductResponse,
        UpdateMealRequest, UpdateQuantityRequest,
    },
    meals::repo_types::{Meal, MealSource},
    meals::services::{CreateMeal, MealDetailsPatch},
    state::AppState,
};

pub fn meal_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route(
            "/meals/:id",
            get(get_meal).patch(update_meal).delete(delete_meal),
        )
        .route(
            "/meals/:id/products/:product_id",
            put(update_product_quantity).delete(remove_product),
        )
        .route("/meals/:id/items", post(add_items))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Meal>> {
    Ok(Json(state.meals.get_by_id(id, user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateMealRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<Meal>)> {
    let date = parse_date(&body.date)?;
    let items = to_new_items(body.items)?;
    let product_ids: Vec<Uuid> = items
        .iter()
        .filter_map(|i| i.item_ref.product_id())
        .collect();

    let meal = state
        .meals
        .create(
            user_id,
            date,
            CreateMeal {
                meal_type: body.meal_type,
                time: body.time,
                items,
                source: MealSource::Manual,
                ai_confidence: None,
            },
        )
        .await?;
    state.products.record_usage(&product_ids).await;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/v1/meals/{}", meal.id))
        .map_err(|e| AppError::from(anyhow::Error::from(e)))?;
    headers.insert(header::LOCATION, location);
    Ok((StatusCode::CREATED, headers, Json(meal)))
}

#[instrument(skip(state, body))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMealRequest>,
) -> AppResult<Json<Meal>> {
    let patch = MealDetailsPatch {
        meal_type: body.meal_type,
        time: body.time,
    };
    Ok(Json(state.meals.update_details(id, user_id, patch).await?))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.meals.delete(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn update_product_quantity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateQuantityRequest>,
) -> AppResult<Json<Meal>> {
    let meal = state
        .meals
        .update_product_quantity(id, user_id, product_id, body.quantity)
        .await?;
    Ok(Json(meal))
}

#[instrument(skip(state))]
pub async fn remove_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<RemoveProductResponse>> {
    let meal = state.meals.remove_product(id, user_id, product_id).await?;
    Ok(Json(RemoveProductResponse {
        deleted: meal.is_none(),
        meal,
    }))
}

#[instrument(skip(state, body))]
pub async fn add_items(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AddItemsRequest>,
) -> AppResult<Json<Meal>> {
    let items = to_new_items(body.items)?;
    let outcome = state.meals.merge_or_add_items(id, user_id, items).await?;
    state.products.record_usage(&outcome.added_product_ids).await;
    Ok(Json(outcome.meal))
}
