use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::model::{ForegroundMessage, Notification};
use crate::{
    error::AppError,
    state::AppState,
    store::{CollectionRef, DocRef, FieldFilter, SetMode, StoreError},
    util::{fields, to_fields},
};

fn inbox(uid: &str) -> CollectionRef {
    DocRef::user(uid).child("notifications")
}

/// Newest first; records without a timestamp go last.
pub async fn list(
    state: &AppState,
    uid: &str,
    read: Option<bool>,
) -> Result<Vec<Notification>, AppError> {
    let filter = read.map(|r| FieldFilter::eq("read", r));
    let docs = state.store.query(&inbox(uid), filter.as_ref()).await?;
    let mut notes = docs
        .into_iter()
        .map(Notification::from_document)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)?;
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(notes)
}

pub async fn unread_count(state: &AppState, uid: &str) -> Result<usize, AppError> {
    let filter = FieldFilter::eq("read", false);
    Ok(state.store.query(&inbox(uid), Some(&filter)).await?.len())
}

pub async fn mark_read(state: &AppState, uid: &str, id: &str) -> Result<(), AppError> {
    match state
        .store
        .update(&inbox(uid).doc(id), fields([("read", json!(true))]))
        .await
    {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound(_)) => Err(AppError::NotFound("Notification".into())),
        Err(e) => Err(AppError::remote_write("Error", "Could not update notification.", e)),
    }
}

pub async fn mark_all_read(state: &AppState, uid: &str) -> Result<usize, AppError> {
    let unread = list(state, uid, Some(false)).await?;
    for note in &unread {
        mark_read(state, uid, &note.id).await?;
    }
    Ok(unread.len())
}

/// Store a foreground push message as an unread in-app notification.
pub async fn receive_foreground(
    state: &AppState,
    uid: &str,
    message: ForegroundMessage,
) -> Result<Notification, AppError> {
    let mut note = message.into_notification();
    let data = to_fields(&note).map_err(StoreError::from)?;
    let doc = state.store.add(&inbox(uid), data).await?;
    note.id = doc.id().to_string();
    debug!(user_id = %uid, notification_id = %note.id, "notification stored");
    Ok(note)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub token_saved: bool,
    pub push_enabled: bool,
}

/// Record the device token on the profile and, when a push notifier is
/// configured and permission is granted, register it for delivery.
pub async fn register_device(
    state: &AppState,
    uid: &str,
    device_token: &str,
) -> Result<DeviceRegistration, AppError> {
    let device_token = device_token.trim();
    if device_token.is_empty() {
        return Err(AppError::validation("Error", "Missing device token."));
    }
    state
        .store
        .set(
            &DocRef::user(uid),
            fields([("deviceToken", json!(device_token))]),
            SetMode::Merge,
        )
        .await
        .map_err(|e| AppError::remote_write("Notification Setup Error", "Could not save device.", e))?;

    let Some(notifier) = state.notifier.as_ref() else {
        info!(user_id = %uid, "push notifications unavailable; token saved only");
        return Ok(DeviceRegistration {
            token_saved: true,
            push_enabled: false,
        });
    };

    let push_enabled = match notifier.request_permission(device_token).await {
        Ok(true) => match notifier.register_token(uid, device_token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, user_id = %uid, "push registration failed");
                false
            }
        },
        Ok(false) => {
            info!(user_id = %uid, "push permission not granted");
            false
        }
        Err(e) => {
            warn!(error = %e, user_id = %uid, "push permission request failed");
            false
        }
    };
    Ok(DeviceRegistration {
        token_saved: true,
        push_enabled,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::http::StatusCode;

    use super::*;
    use crate::notifications::push::{PushError, PushNotifier};
    use crate::store::DocumentStore;

    struct FakePush {
        grant: bool,
        registered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushNotifier for FakePush {
        async fn request_permission(&self, _token: &str) -> Result<bool, PushError> {
            Ok(self.grant)
        }

        async fn register_token(&self, uid: &str, _token: &str) -> Result<(), PushError> {
            self.registered.lock().unwrap().push(uid.to_string());
            Ok(())
        }
    }

    fn message(title: &str) -> ForegroundMessage {
        ForegroundMessage {
            title: Some(title.into()),
            body: None,
        }
    }

    #[tokio::test]
    async fn unread_filter_count_and_mark_read() {
        let state = AppState::fake();
        let first = receive_foreground(&state, "u1", message("one")).await.unwrap();
        receive_foreground(&state, "u1", message("two")).await.unwrap();
        assert_eq!(unread_count(&state, "u1").await.unwrap(), 2);

        mark_read(&state, "u1", &first.id).await.unwrap();
        assert_eq!(unread_count(&state, "u1").await.unwrap(), 1);
        let read = list(&state, "u1", Some(true)).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].title, "one");
        assert_eq!(list(&state, "u1", None).await.unwrap().len(), 2);

        assert_eq!(mark_all_read(&state, "u1").await.unwrap(), 1);
        assert_eq!(unread_count(&state, "u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_read_unknown_is_not_found() {
        let state = AppState::fake();
        let err = mark_read(&state, "u1", "missing").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn device_token_is_saved_without_a_notifier() {
        let state = AppState::fake();
        let reg = register_device(&state, "u1", "tok-1").await.unwrap();
        assert!(reg.token_saved);
        assert!(!reg.push_enabled);
        let doc = state.store.get(&DocRef::user("u1")).await.unwrap().unwrap();
        assert_eq!(doc.str_field("deviceToken"), Some("tok-1"));
    }

    #[tokio::test]
    async fn notifier_registers_only_when_permitted() {
        let push = Arc::new(FakePush {
            grant: true,
            registered: Mutex::new(Vec::new()),
        });
        let state = AppState::fake().with_notifier(push.clone());
        assert!(register_device(&state, "u1", "tok").await.unwrap().push_enabled);
        assert_eq!(push.registered.lock().unwrap().as_slice(), ["u1".to_string()]);

        let denied = AppState::fake().with_notifier(Arc::new(FakePush {
            grant: false,
            registered: Mutex::new(Vec::new()),
        }));
        let reg = register_device(&denied, "u1", "tok").await.unwrap();
        assert!(reg.token_saved && !reg.push_enabled);
    }
}
