use tracing::info;

use super::model::{fresh_id, WardrobeItem};
use crate::{
    alerts::Alert,
    error::AppError,
    images::{UploadFile, UploadRole},
    state::AppState,
    store::DocRef,
    sync::{ArraySync, MergeStrategy, ScreenScope},
    util::now_millis,
};

/// Array field on the user document holding the wardrobe.
pub const FIELD: &str = "wardrobe";

pub async fn open(
    state: &AppState,
    uid: &str,
    scope: &ScreenScope,
) -> Result<ArraySync<WardrobeItem>, AppError> {
    let sync = ArraySync::new(
        state.store.clone(),
        DocRef::user(uid),
        FIELD,
        MergeStrategy::Keyed,
        scope,
    )
    .with_alerts(state.alerts.clone())
    .with_failure_alert(Alert::new("Error", "Could not update your wardrobe."));
    sync.load().await?;
    Ok(sync)
}

/// Whole wardrobe, or only the items of one category.
pub async fn list(
    state: &AppState,
    uid: &str,
    category: Option<&str>,
) -> Result<Vec<WardrobeItem>, AppError> {
    let scope = ScreenScope::new();
    let items = open(state, uid, &scope).await?.items();
    Ok(match category.filter(|c| !c.is_empty()) {
        Some(category) => items.into_iter().filter(|i| i.category == category).collect(),
        None => items,
    })
}

/// Upload the photo, then append the new item. Nothing changes locally when
/// the upload fails.
pub async fn add(
    state: &AppState,
    uid: &str,
    tag: &str,
    category: &str,
    photo: Option<UploadFile>,
) -> Result<WardrobeItem, AppError> {
    let (tag, category) = (tag.trim(), category.trim());
    if tag.is_empty() {
        return Err(AppError::validation("Error", "Please describe the outfit."));
    }
    if category.is_empty() {
        return Err(AppError::validation("Error", "Please pick a category."));
    }
    let photo = photo.ok_or_else(|| AppError::validation("Error", "Please select a photo."))?;

    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope)
        .await?
        .with_failure_alert(Alert::new("Error", "Upload failed. Try again."));
    let uri = scope
        .guard(
            state
                .images
                .upload(photo.body, &photo.content_type, UploadRole::User),
        )
        .await
        .ok_or(AppError::Cancelled)??;

    let (id, timestamp) = fresh_id(tag, category, now_millis(), |id| {
        sync.get(&id.to_string()).is_some()
    });
    let item = WardrobeItem {
        id,
        uri,
        custom_tag: tag.to_string(),
        category: category.to_string(),
        timestamp,
    };
    sync.add(item.clone()).await?;
    info!(user_id = %uid, item_id = %item.id, "wardrobe item added");
    Ok(item)
}

pub async fn edit(
    state: &AppState,
    uid: &str,
    id: &str,
    tag: &str,
    category: &str,
) -> Result<WardrobeItem, AppError> {
    let (tag, category) = (tag.trim(), category.trim());
    if tag.is_empty() {
        return Err(AppError::validation("Error", "Please enter a tag."));
    }
    if category.is_empty() {
        return Err(AppError::validation("Error", "Please select a category."));
    }
    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    let edited = sync
        .update(&id.to_string(), |item| WardrobeItem {
            custom_tag: tag.to_string(),
            category: category.to_string(),
            ..item.clone()
        })
        .await?;
    info!(user_id = %uid, item_id = %id, "wardrobe item edited");
    Ok(edited)
}

pub async fn delete(state: &AppState, uid: &str, id: &str) -> Result<Vec<WardrobeItem>, AppError> {
    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    sync.remove(&id.to_string()).await?;
    info!(user_id = %uid, item_id = %id, "wardrobe item deleted");
    Ok(sync.items())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use bytes::Bytes;

    use super::*;

    fn photo() -> Option<UploadFile> {
        Some(UploadFile {
            body: Bytes::from_static(b"jpeg"),
            content_type: "image/jpeg".into(),
        })
    }

    #[tokio::test]
    async fn add_then_delete_black_crop_top() {
        let state = AppState::fake();
        let item = add(&state, "u1", "black crop top", "Casual", photo())
            .await
            .unwrap();

        let items = list(&state, "u1", None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].id.contains("black crop top"));
        assert!(items[0].id.contains("Casual"));
        assert_eq!(items[0].category, "Casual");
        assert!(items[0].uri.contains("user_outfits/"));

        let left = delete(&state, "u1", &item.id).await.unwrap();
        assert!(left.is_empty());
        assert!(list(&state, "u1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn validation_happens_before_upload() {
        let state = AppState::fake();
        let err = add(&state, "u1", "  ", "Casual", photo()).await.unwrap_err();
        assert_eq!(err.alert().message, "Please describe the outfit.");
        let err = add(&state, "u1", "tee", "", photo()).await.unwrap_err();
        assert_eq!(err.alert().message, "Please pick a category.");
        let err = add(&state, "u1", "tee", "Casual", None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(list(&state, "u1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_leaves_wardrobe_unchanged() {
        let state = AppState::fake();
        let bad = Some(UploadFile {
            body: Bytes::new(),
            content_type: "image/jpeg".into(),
        });
        let err = add(&state, "u1", "tee", "Casual", bad).await.unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));
        assert!(list(&state, "u1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filter_and_edit_keep_other_items() {
        let state = AppState::fake();
        let tee = add(&state, "u1", "tee", "Casual", photo()).await.unwrap();
        add(&state, "u1", "gown", "Party", photo()).await.unwrap();

        let party = list(&state, "u1", Some("Party")).await.unwrap();
        assert_eq!(party.len(), 1);
        assert_eq!(party[0].custom_tag, "gown");

        let edited = edit(&state, "u1", &tee.id, "white tee", "Formal").await.unwrap();
        assert_eq!(edited.id, tee.id);
        let all = list(&state, "u1", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].custom_tag, "white tee");
        assert_eq!(all[0].category, "Formal");
        assert_eq!(all[1].custom_tag, "gown");
    }

    #[tokio::test]
    async fn edit_unknown_item_is_not_found() {
        let state = AppState::fake();
        let err = edit(&state, "u1", "nope", "tee", "Casual").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
