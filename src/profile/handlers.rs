use axum::{
    extract::{Multipart, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::model::{skin_color, Landing, UserProfile};
use super::services::{self, ShopperPrefs};
use crate::{auth::AuthUser, error::AppError, images::UploadForm, state::AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/me/profile", get(get_profile))
        .route("/me/profile/setup", post(complete_setup))
        .route("/me/profile/preferences", put(update_preferences))
        .route("/me/profile/store", post(store_setup))
        .route("/me/profile/picture", post(upload_picture))
        .route("/me/profile/name", put(rename))
        .route("/me/profile/notifications", put(set_notifications))
}

/// A profile as the home and settings screens render it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub display_name: String,
    pub landing: Landing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin_color: Option<String>,
}

impl From<UserProfile> for ProfileView {
    fn from(profile: UserProfile) -> Self {
        Self {
            display_name: profile.display_name(),
            landing: profile.landing(),
            skin_color: profile.skin_tone.map(skin_color),
            profile,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub enabled: bool,
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ProfileView>, AppError> {
    let profile = services::require(&state, &user.doc_id()).await?;
    Ok(Json(profile.into()))
}

#[instrument(skip(state, prefs))]
pub async fn complete_setup(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(prefs): Json<ShopperPrefs>,
) -> Result<Json<ProfileView>, AppError> {
    let profile = services::complete_setup(&state, &user.doc_id(), &prefs).await?;
    Ok(Json(profile.into()))
}

#[instrument(skip(state, prefs))]
pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(prefs): Json<ShopperPrefs>,
) -> Result<Json<ProfileView>, AppError> {
    let profile = services::update_preferences(&state, &user.doc_id(), &prefs).await?;
    Ok(Json(profile.into()))
}

/// POST /me/profile/store (multipart: `file` logo, `description`)
#[instrument(skip(state, mp))]
pub async fn store_setup(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> Result<Json<ProfileView>, AppError> {
    let mut form = UploadForm::read(mp).await?;
    let description = form.field("description").unwrap_or_default().to_string();
    let logo = form.take_file().ok();
    let profile =
        services::complete_store_setup(&state, &user.doc_id(), logo, &description).await?;
    Ok(Json(profile.into()))
}

/// POST /me/profile/picture (multipart: `file`)
#[instrument(skip(state, mp))]
pub async fn upload_picture(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> Result<Json<ProfileView>, AppError> {
    let mut form = UploadForm::read(mp).await?;
    let image = form.take_file()?;
    let profile = services::set_profile_picture(&state, &user.doc_id(), image).await?;
    Ok(Json(profile.into()))
}

#[instrument(skip(state, body))]
pub async fn rename(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<RenameRequest>,
) -> Result<Json<ProfileView>, AppError> {
    let profile =
        services::rename(&state, &user.doc_id(), &body.first_name, &body.last_name).await?;
    Ok(Json(profile.into()))
}

#[instrument(skip(state))]
pub async fn set_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<NotificationsRequest>,
) -> Result<Json<NotificationsResponse>, AppError> {
    services::set_notifications(&state, &user.doc_id(), body.enabled).await?;
    Ok(Json(NotificationsResponse {
        enabled: body.enabled,
    }))
}
