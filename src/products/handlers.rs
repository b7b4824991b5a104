use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppResult,
    products::dto::{CreateProductRequest, SearchQuery, UpdateProductRequest},
    products::repo_types::Product,
    state::AppState,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/search", get(search_products))
        .route("/products/:id", get(get_product).patch(update_product))
}

#[instrument(skip(state, body))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = state.products.create(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, _user))]
pub async fn search_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.products.search(&q.q, q.limit).await?))
}

#[instrument(skip(state, _user))]
pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.products.get(id).await?))
}

#[instrument(skip(state, body))]
pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.products.update(id, user_id, body).await?))
}
