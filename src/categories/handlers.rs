use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::services::{self, CategoryList};
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/me/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/me/categories/:name",
            put(rename_category).delete(delete_category),
        )
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CategoryList>, AppError> {
    Ok(Json(services::list(&state, &user.doc_id()).await?))
}

#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<CategoryList>, AppError> {
    Ok(Json(services::create(&state, &user.doc_id(), &body.name).await?))
}

#[instrument(skip(state))]
pub async fn rename_category(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<CategoryList>, AppError> {
    Ok(Json(
        services::rename(&state, &user.doc_id(), &name, &body.name).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
) -> Result<Json<CategoryList>, AppError> {
    Ok(Json(services::delete(&state, &user.doc_id(), &name).await?))
}
