use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::{UploadForm, UploadRole};
use crate::{auth::AuthUser, error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub role: UploadRole,
}

/// POST /uploads (multipart: `file`, optional `role`)
#[instrument(skip(state, mp))]
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut form = UploadForm::read(mp).await?;
    let role = UploadRole::from_tag(form.field("role").unwrap_or("user"));
    let file = form.take_file()?;
    let url = state
        .images
        .upload(file.body, &file.content_type, role)
        .await?;
    info!(user_id = %user.uid, role = ?role, "image uploaded");
    Ok(Json(UploadResponse { url, role }))
}
