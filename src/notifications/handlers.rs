use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::model::{ForegroundMessage, Notification};
use super::services::{self, DeviceRegistration};
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/me/notifications",
            get(list_notifications).post(receive_message),
        )
        .route("/me/notifications/unread-count", get(unread_count))
        .route("/me/notifications/read-all", post(mark_all_read))
        .route("/me/notifications/:id/read", post(mark_read))
        .route("/me/device", post(register_device))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub read: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    #[serde(default)]
    pub device_token: String,
}

#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(services::list(&state, &user.doc_id(), q.read).await?))
}

#[instrument(skip(state))]
pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CountResponse>, AppError> {
    let count = services::unread_count(&state, &user.doc_id()).await?;
    Ok(Json(CountResponse { count }))
}

#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    services::mark_read(&state, &user.doc_id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<CountResponse>, AppError> {
    let count = services::mark_all_read(&state, &user.doc_id()).await?;
    Ok(Json(CountResponse { count }))
}

#[instrument(skip(state))]
pub async fn receive_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(message): Json<ForegroundMessage>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let note = services::receive_foreground(&state, &user.doc_id(), message).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

#[instrument(skip(state, body))]
pub async fn register_device(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<DeviceRequest>,
) -> Result<Json<DeviceRegistration>, AppError> {
    Ok(Json(
        services::register_device(&state, &user.doc_id(), &body.device_token).await?,
    ))
}
