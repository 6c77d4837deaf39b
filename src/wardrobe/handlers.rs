use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::model::WardrobeItem;
use super::services;
use crate::{auth::AuthUser, error::AppError, images::UploadForm, state::AppState};

pub fn wardrobe_routes() -> Router<AppState> {
    Router::new()
        .route("/me/wardrobe", get(list_items).post(add_item))
        .route("/me/wardrobe/:id", put(edit_item).delete(delete_item))
}

#[derive(Debug, Deserialize)]
pub struct WardrobeFilter {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditItemRequest {
    #[serde(default)]
    pub custom_tag: String,
    #[serde(default)]
    pub category: String,
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(filter): Query<WardrobeFilter>,
) -> Result<Json<Vec<WardrobeItem>>, AppError> {
    let items = services::list(&state, &user.doc_id(), filter.category.as_deref()).await?;
    Ok(Json(items))
}

/// POST /me/wardrobe (multipart: `file`, `customTag`, `category`)
#[instrument(skip(state, mp))]
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, Json<WardrobeItem>), AppError> {
    let mut form = UploadForm::read(mp).await?;
    let photo = form.take_file().ok();
    let item = services::add(
        &state,
        &user.doc_id(),
        form.field("customTag").unwrap_or_default(),
        form.field("category").unwrap_or_default(),
        photo,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn edit_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<EditItemRequest>,
) -> Result<Json<WardrobeItem>, AppError> {
    let item =
        services::edit(&state, &user.doc_id(), &id, &body.custom_tag, &body.category).await?;
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<WardrobeItem>>, AppError> {
    Ok(Json(services::delete(&state, &user.doc_id(), &id).await?))
}
