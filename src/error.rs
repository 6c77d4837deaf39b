//! HTTP-level error type. Every failure is rendered as the alert the screen
//! would have shown: `{ "title": ..., "message": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::alerts::Alert;
use crate::auth::AuthError;
use crate::images::UploadError;
use crate::store::StoreError;
use crate::sync::SyncError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid form input, caught before any remote call.
    #[error("{0}")]
    Validation(Alert),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Denied(Alert),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{alert}")]
    Conflict { alert: Alert, source: StoreError },

    #[error("remote write failed: {source}")]
    RemoteWrite { alert: Alert, source: StoreError },

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("remote read failed: {0}")]
    Store(#[from] StoreError),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(title: &str, message: &str) -> Self {
        Self::Validation(Alert::new(title, message))
    }

    /// Wrap a failed write with the alert the screen shows for it.
    pub fn remote_write(title: &str, message: &str, source: StoreError) -> Self {
        Self::RemoteWrite {
            alert: Alert::new(title, message),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(err) => match err {
                AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
                AuthError::EmailInUse => StatusCode::CONFLICT,
                AuthError::Backend(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::UNAUTHORIZED,
            },
            Self::Denied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::RemoteWrite { .. } | Self::Upload(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn alert(&self) -> Alert {
        match self {
            Self::Validation(alert) | Self::Denied(alert) => alert.clone(),
            Self::Conflict { alert, .. } | Self::RemoteWrite { alert, .. } => alert.clone(),
            Self::Auth(err) => Alert::new("Authentication Failed", err.user_message()),
            Self::NotFound(what) => Alert::new("Not Found", format!("{what} not found.")),
            Self::Upload(_) => Alert::new("Upload Failed", "Please try again."),
            Self::Store(_) => Alert::new("Error", "Could not load your data."),
            Self::Cancelled => Alert::new("Cancelled", "The request was cancelled."),
            Self::Internal(_) => Alert::new("Error", "Something went wrong."),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Duplicate(id) => {
                Self::Validation(Alert::new("Already exists", format!("\"{id}\" already exists.")))
            }
            SyncError::NotFound(id) => Self::NotFound(id),
            SyncError::Cancelled => Self::Cancelled,
            SyncError::Read(source) => Self::Store(source),
            SyncError::Encode(e) => Self::Internal(e.to_string()),
            SyncError::Write { alert, source } => match source {
                StoreError::Conflict { .. } => Self::Conflict { alert, source },
                source => Self::RemoteWrite { alert, source },
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        (status, Json(self.alert())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_write_failures_keep_the_screen_alert() {
        let err: AppError = SyncError::Write {
            alert: Alert::new("Error", "Could not save category."),
            source: StoreError::Unavailable("down".into()),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.alert().message, "Could not save category.");
    }

    #[test]
    fn conflicts_map_to_409() {
        let err: AppError = SyncError::Write {
            alert: crate::sync::conflict_alert(),
            source: StoreError::Conflict {
                path: "users/u1".into(),
                expected: 1,
                found: 2,
            },
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_errors_use_friendly_messages() {
        let err = AppError::from(AuthError::UserNotFound);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.alert().message, "No account found for that email.");

        let err = AppError::from(AuthError::WrongPassword);
        assert_eq!(err.alert().message, "Incorrect password.");

        let err = AppError::from(AuthError::EmailInUse);
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
