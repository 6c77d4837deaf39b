use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::model::{parse_tags, SellerPost};
use super::services::{self, PostDraft};
use crate::{auth::AuthUser, error::AppError, images::UploadForm, state::AppState};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/me/posts", get(list_posts).post(create_post))
        .route(
            "/me/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // up to 10 photos
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<SellerPost>>, AppError> {
    Ok(Json(services::list(&state, &user.doc_id()).await?))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SellerPost>, AppError> {
    Ok(Json(services::get(&state, &user.doc_id(), &id).await?))
}

/// POST /me/posts (multipart: `files[]`, `caption`, `price`, `color`, `size`,
/// `brand`, `tags` as whitespace-separated text)
#[instrument(skip(state, mp))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, Json<SellerPost>), AppError> {
    let mut form = UploadForm::read(mp).await?;
    let text = |name: &str| form.field(name).unwrap_or_default().to_string();
    let draft = PostDraft {
        caption: text("caption"),
        price: text("price"),
        color: text("color"),
        size: text("size"),
        brand: text("brand"),
        tags: parse_tags(&text("tags")),
    };
    let photos = form.take_files();
    let post = services::create(&state, &user.doc_id(), draft, photos).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state))]
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(draft): Json<PostDraft>,
) -> Result<Json<SellerPost>, AppError> {
    Ok(Json(services::update(&state, &user.doc_id(), &id, draft).await?))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<SellerPost>>, AppError> {
    Ok(Json(services::delete(&state, &user.doc_id(), &id).await?))
}
