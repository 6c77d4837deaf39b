use serde::Deserialize;
use tracing::info;

use super::model::{normalize_tags, post_id, SellerPost, MAX_IMAGES};
use crate::{
    alerts::Alert,
    error::AppError,
    images::{UploadFile, UploadRole},
    profile::{services as profiles, Role},
    state::AppState,
    store::DocRef,
    sync::{ArraySync, MergeStrategy, ScreenScope},
    util::now_millis,
};

/// Array field on the seller's user document holding the posts.
pub const FIELD: &str = "posts";

/// Editable fields of a post.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostDraft {
    pub caption: String,
    pub price: String,
    pub color: String,
    pub size: String,
    pub brand: String,
    pub tags: Vec<String>,
}

impl PostDraft {
    fn validate(&self) -> Result<(), AppError> {
        if self.caption.trim().is_empty() {
            return Err(AppError::validation("Caption Required", "Please enter a caption"));
        }
        Ok(())
    }

    fn apply(self, id: String, images: Vec<String>) -> SellerPost {
        SellerPost {
            id,
            images,
            caption: self.caption.trim().to_string(),
            price: self.price.trim().to_string(),
            color: self.color.trim().to_string(),
            size: self.size.trim().to_string(),
            brand: self.brand.trim().to_string(),
            tags: normalize_tags(self.tags.iter().map(String::as_str)),
        }
    }
}

async fn require_seller(state: &AppState, uid: &str) -> Result<(), AppError> {
    let role = profiles::load(state, uid).await?.map(|p| p.role);
    if role != Some(Role::Seller) {
        return Err(AppError::Denied(Role::Seller.portal_denied()));
    }
    Ok(())
}

pub async fn open(
    state: &AppState,
    uid: &str,
    scope: &ScreenScope,
) -> Result<ArraySync<SellerPost>, AppError> {
    require_seller(state, uid).await?;
    let sync = ArraySync::new(
        state.store.clone(),
        DocRef::user(uid),
        FIELD,
        MergeStrategy::Keyed,
        scope,
    )
    .with_alerts(state.alerts.clone())
    .with_failure_alert(Alert::new("Error", "Could not save your post."));
    sync.load().await?;
    Ok(sync)
}

pub async fn list(state: &AppState, uid: &str) -> Result<Vec<SellerPost>, AppError> {
    let scope = ScreenScope::new();
    Ok(open(state, uid, &scope).await?.items())
}

pub async fn get(state: &AppState, uid: &str, id: &str) -> Result<SellerPost, AppError> {
    let scope = ScreenScope::new();
    open(state, uid, &scope)
        .await?
        .get(&id.to_string())
        .ok_or_else(|| AppError::NotFound("Post".into()))
}

/// Upload every photo, then publish the post.
pub async fn create(
    state: &AppState,
    uid: &str,
    draft: PostDraft,
    photos: Vec<UploadFile>,
) -> Result<SellerPost, AppError> {
    if photos.is_empty() {
        return Err(AppError::validation("Error", "Please select at least one photo"));
    }
    if photos.len() > MAX_IMAGES {
        return Err(AppError::validation(
            "Error",
            &format!("You can add up to {MAX_IMAGES} photos."),
        ));
    }
    draft.validate()?;

    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    let mut images = Vec::with_capacity(photos.len());
    for photo in photos {
        let url = scope
            .guard(
                state
                    .images
                    .upload(photo.body, &photo.content_type, UploadRole::Seller),
            )
            .await
            .ok_or(AppError::Cancelled)??;
        images.push(url);
    }

    let mut millis = now_millis();
    while sync.get(&post_id(millis)).is_some() {
        millis += 1;
    }
    let post = draft.apply(post_id(millis), images);
    sync.add(post.clone()).await?;
    info!(user_id = %uid, post_id = %post.id, images = post.images.len(), "post created");
    Ok(post)
}

pub async fn update(
    state: &AppState,
    uid: &str,
    id: &str,
    draft: PostDraft,
) -> Result<SellerPost, AppError> {
    draft.validate()?;
    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    let post = sync
        .update(&id.to_string(), |current| {
            draft.apply(current.id.clone(), current.images.clone())
        })
        .await?;
    info!(user_id = %uid, post_id = %id, "post updated");
    Ok(post)
}

pub async fn delete(state: &AppState, uid: &str, id: &str) -> Result<Vec<SellerPost>, AppError> {
    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    sync.remove(&id.to_string()).await?;
    info!(user_id = %uid, post_id = %id, "post deleted");
    Ok(sync.items())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use bytes::Bytes;

    use super::*;
    use crate::profile::services::NewProfile;

    async fn seller(state: &AppState) {
        profiles::create(
            state,
            "s1",
            NewProfile {
                first_name: "Sana".into(),
                last_name: "Ali".into(),
                email: "sana@example.com".into(),
                role: Role::Seller,
                store_name: Some("Threads".into()),
                contact_no: Some("0300".into()),
            },
        )
        .await
        .unwrap();
    }

    fn photos(n: usize) -> Vec<UploadFile> {
        (0..n)
            .map(|_| UploadFile {
                body: Bytes::from_static(b"jpeg"),
                content_type: "image/jpeg".into(),
            })
            .collect()
    }

    fn draft(caption: &str) -> PostDraft {
        PostDraft {
            caption: caption.into(),
            price: "2500".into(),
            tags: vec!["lawn".into(), "#lawn".into(), "eid".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_uploads_images_and_normalises_tags() {
        let state = AppState::fake();
        seller(&state).await;
        let post = create(&state, "s1", draft(" Summer drop "), photos(3))
            .await
            .unwrap();
        assert!(post.id.starts_with("post_"));
        assert_eq!(post.caption, "Summer drop");
        assert_eq!(post.images.len(), 3);
        assert!(post.images.iter().all(|u| u.contains("seller_outfits/")));
        assert_eq!(post.tags, ["#lawn", "#eid"]);
        assert_eq!(list(&state, "s1").await.unwrap(), vec![post]);
    }

    #[tokio::test]
    async fn image_count_and_caption_are_validated() {
        let state = AppState::fake();
        seller(&state).await;
        assert!(create(&state, "s1", draft("x"), photos(0)).await.is_err());
        assert!(create(&state, "s1", draft("x"), photos(11)).await.is_err());
        let err = create(&state, "s1", draft("  "), photos(1)).await.unwrap_err();
        assert_eq!(err.alert().title, "Caption Required");
        assert!(list(&state, "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_images_and_delete_removes() {
        let state = AppState::fake();
        seller(&state).await;
        let first = create(&state, "s1", draft("one"), photos(2)).await.unwrap();
        let second = create(&state, "s1", draft("two"), photos(1)).await.unwrap();
        assert_ne!(first.id, second.id);

        let edited = update(
            &state,
            "s1",
            &first.id,
            PostDraft {
                caption: "uno".into(),
                tags: vec!["sale".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(edited.images, first.images);
        assert_eq!(edited.tags, ["#sale"]);

        let left = delete(&state, "s1", &second.id).await.unwrap();
        assert_eq!(left, vec![edited]);
        let err = get(&state, "s1", &second.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn shoppers_cannot_manage_posts() {
        let state = AppState::fake();
        let err = list(&state, "nobody").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
