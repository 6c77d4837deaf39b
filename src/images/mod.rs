//! Image host collaborator. Uploads go to a folder chosen by role and come
//! back as a public URL.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{extract::Multipart, routing::post, Router};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{error::AppError, state::AppState, util::now_millis};

pub mod handlers;
pub mod s3;

pub use s3::S3ImageHost;

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads", post(handlers::upload))
}

/// Upload destination. Each role maps to its own folder and preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadRole {
    User,
    Seller,
    Profile,
}

impl UploadRole {
    /// Unknown tags fall back to `User`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "seller" | "seller_outfits" => Self::Seller,
            "profile" | "profile_pictures" => Self::Profile,
            _ => Self::User,
        }
    }

    pub fn preset(self) -> &'static str {
        match self {
            Self::User => "user_outfits",
            Self::Seller => "seller_outfits",
            Self::Profile => "profile_pictures",
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no image data provided")]
    Empty,

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("image host error: {0}")]
    Host(String),
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(
        &self,
        body: Bytes,
        content_type: &str,
        role: UploadRole,
    ) -> Result<String, UploadError>;
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Validate an upload and pick its object key, e.g.
/// `seller_outfits/upload_1718000000000-<uuid>.jpg`.
pub(crate) fn object_key(
    role: UploadRole,
    content_type: &str,
    body: &Bytes,
) -> Result<String, UploadError> {
    if body.is_empty() {
        return Err(UploadError::Empty);
    }
    let ext = ext_from_mime(content_type)
        .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;
    Ok(format!(
        "{}/upload_{}-{}.{}",
        role.preset(),
        now_millis(),
        Uuid::new_v4(),
        ext
    ))
}

pub struct UploadFile {
    pub body: Bytes,
    pub content_type: String,
}

/// A multipart form carrying images plus plain text fields.
#[derive(Default)]
pub struct UploadForm {
    files: Vec<UploadFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    const FILE_FIELDS: [&'static str; 4] = ["file", "files", "files[]", "image"];

    pub async fn read(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = mp.next_field().await.map_err(bad_form)? {
            let name = field.name().unwrap_or_default().to_string();
            if Self::FILE_FIELDS.contains(&name.as_str()) {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "image/jpeg".into());
                let body = field.bytes().await.map_err(bad_form)?;
                form.files.push(UploadFile { body, content_type });
            } else {
                let text = field.text().await.map_err(bad_form)?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The first image of the form.
    pub fn take_file(&mut self) -> Result<UploadFile, AppError> {
        if self.files.is_empty() {
            return Err(AppError::validation("Error", "Please select a photo."));
        }
        Ok(self.files.remove(0))
    }

    pub fn take_files(&mut self) -> Vec<UploadFile> {
        std::mem::take(&mut self.files)
    }
}

fn bad_form(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::validation("Upload Failed", &e.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn role_tags_fall_back_to_user() {
        assert_eq!(UploadRole::from_tag("seller"), UploadRole::Seller);
        assert_eq!(UploadRole::from_tag("user_outfits"), UploadRole::User);
        assert_eq!(UploadRole::from_tag("profile_pictures"), UploadRole::Profile);
        assert_eq!(UploadRole::from_tag("whatever"), UploadRole::User);
        assert_eq!(UploadRole::Seller.preset(), "seller_outfits");
    }

    #[test]
    fn object_key_uses_role_folder_and_extension() {
        let key = object_key(UploadRole::Seller, "image/png", &Bytes::from_static(b"png")).unwrap();
        assert!(key.starts_with("seller_outfits/upload_"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn object_key_rejects_empty_and_unknown_types() {
        assert!(matches!(
            object_key(UploadRole::User, "image/jpeg", &Bytes::new()),
            Err(UploadError::Empty)
        ));
        assert!(matches!(
            object_key(UploadRole::User, "text/plain", &Bytes::from_static(b"hi")),
            Err(UploadError::UnsupportedType(_))
        ));
    }
}
