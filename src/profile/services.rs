use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::model::{BodyType, ClothingSize, Role, StylePref, UserProfile};
use crate::{
    error::AppError,
    images::{UploadFile, UploadRole},
    state::AppState,
    store::{DocRef, SetMode, StoreError},
    util::{fields, to_fields},
};

/// Fields collected by the sign-up screens.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub store_name: Option<String>,
    pub contact_no: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopperPrefs {
    pub body_type: BodyType,
    pub clothing_size: ClothingSize,
    pub skin_tone: f64,
    pub style_prefs: Vec<StylePref>,
}

impl ShopperPrefs {
    fn validate(&self, empty_styles: &str) -> Result<(), AppError> {
        if self.style_prefs.is_empty() {
            return Err(AppError::validation("Validation", empty_styles));
        }
        if !(0.0..=1.0).contains(&self.skin_tone) {
            return Err(AppError::validation(
                "Validation",
                "Skin tone must be between 0 and 1.",
            ));
        }
        Ok(())
    }
}

pub async fn create(state: &AppState, uid: &str, new: NewProfile) -> Result<UserProfile, StoreError> {
    let profile = UserProfile {
        first_name: new.first_name.trim().to_string(),
        last_name: new.last_name.trim().to_string(),
        email: new.email,
        role: new.role,
        profile_complete: false,
        created_at: Some(OffsetDateTime::now_utc()),
        store_name: new.store_name.map(|s| s.trim().to_string()),
        contact_no: new.contact_no.map(|s| s.trim().to_string()),
        ..Default::default()
    };
    state
        .store
        .set(&DocRef::user(uid), to_fields(&profile)?, SetMode::Replace)
        .await?;
    info!(user_id = %uid, role = profile.role.as_str(), "profile created");
    Ok(profile)
}

pub async fn load(state: &AppState, uid: &str) -> Result<Option<UserProfile>, StoreError> {
    let Some(doc) = state.store.get(&DocRef::user(uid)).await? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_value(Value::Object(doc.data))?))
}

pub async fn require(state: &AppState, uid: &str) -> Result<UserProfile, AppError> {
    load(state, uid)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile".into()))
}

/// First-run shopper setup. Marks the profile complete.
pub async fn complete_setup(
    state: &AppState,
    uid: &str,
    prefs: &ShopperPrefs,
) -> Result<UserProfile, AppError> {
    prefs.validate("Please select at least one style.")?;
    let mut patch = to_fields(prefs).map_err(|e| AppError::Internal(e.to_string()))?;
    patch.insert("profileComplete".into(), json!(true));
    state
        .store
        .update(&DocRef::user(uid), patch)
        .await
        .map_err(|e| AppError::remote_write("Error", "Could not save preferences.", e))?;
    info!(user_id = %uid, "profile setup complete");
    require(state, uid).await
}

/// Later edits from the settings screen; merges into the document.
pub async fn update_preferences(
    state: &AppState,
    uid: &str,
    prefs: &ShopperPrefs,
) -> Result<UserProfile, AppError> {
    prefs.validate("Select at least one style.")?;
    let patch = to_fields(prefs).map_err(|e| AppError::Internal(e.to_string()))?;
    state
        .store
        .set(&DocRef::user(uid), patch, SetMode::Merge)
        .await
        .map_err(|e| AppError::remote_write("Error", "Could not save preferences.", e))?;
    debug!(user_id = %uid, "preferences updated");
    require(state, uid).await
}

/// Seller store setup: the logo is uploaded first, then the profile is
/// completed with its URL.
pub async fn complete_store_setup(
    state: &AppState,
    uid: &str,
    logo: Option<UploadFile>,
    description: &str,
) -> Result<UserProfile, AppError> {
    let logo =
        logo.ok_or_else(|| AppError::validation("Error", "Please upload your store logo."))?;
    let url = state
        .images
        .upload(logo.body, &logo.content_type, UploadRole::Seller)
        .await?;
    state
        .store
        .update(
            &DocRef::user(uid),
            fields([
                ("storeDpUrl", json!(url)),
                ("description", json!(description.trim())),
                ("profileComplete", json!(true)),
            ]),
        )
        .await
        .map_err(|e| AppError::remote_write("Upload Failed", "Please try again.", e))?;
    info!(user_id = %uid, "store setup complete");
    require(state, uid).await
}

pub async fn set_profile_picture(
    state: &AppState,
    uid: &str,
    image: UploadFile,
) -> Result<UserProfile, AppError> {
    let url = state
        .images
        .upload(image.body, &image.content_type, UploadRole::Profile)
        .await?;
    state
        .store
        .update(&DocRef::user(uid), fields([("profilePicture", json!(url))]))
        .await
        .map_err(|e| AppError::remote_write("Upload Failed", "Please try again.", e))?;
    require(state, uid).await
}

pub async fn rename(
    state: &AppState,
    uid: &str,
    first_name: &str,
    last_name: &str,
) -> Result<UserProfile, AppError> {
    if first_name.trim().is_empty() {
        return Err(AppError::validation("Error", "Name cannot be empty"));
    }
    state
        .store
        .update(
            &DocRef::user(uid),
            fields([
                ("firstName", json!(first_name.trim())),
                ("lastName", json!(last_name.trim())),
            ]),
        )
        .await
        .map_err(|e| AppError::remote_write("Error", "Could not save your name.", e))?;
    require(state, uid).await
}

pub async fn set_notifications(state: &AppState, uid: &str, enabled: bool) -> Result<(), AppError> {
    state
        .store
        .set(
            &DocRef::user(uid),
            fields([("notificationsEnabled", json!(enabled))]),
            SetMode::Merge,
        )
        .await
        .map_err(|e| AppError::remote_write("Error", "Could not update settings.", e))?;
    debug!(user_id = %uid, enabled, "notification setting saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn shopper() -> NewProfile {
        NewProfile {
            first_name: " Ana ".into(),
            last_name: "Khan".into(),
            email: "ana@example.com".into(),
            role: Role::User,
            store_name: None,
            contact_no: None,
        }
    }

    fn prefs(styles: Vec<StylePref>) -> ShopperPrefs {
        ShopperPrefs {
            body_type: BodyType::Normal,
            clothing_size: ClothingSize::M,
            skin_tone: 0.4,
            style_prefs: styles,
        }
    }

    #[tokio::test]
    async fn setup_completes_profile() {
        let state = AppState::fake();
        create(&state, "u1", shopper()).await.unwrap();
        let loaded = require(&state, "u1").await.unwrap();
        assert_eq!(loaded.first_name, "Ana");
        assert!(!loaded.profile_complete);

        let done = complete_setup(&state, "u1", &prefs(vec![StylePref::Casual]))
            .await
            .unwrap();
        assert!(done.profile_complete);
        assert_eq!(done.style_prefs, vec![StylePref::Casual]);
    }

    #[tokio::test]
    async fn setup_requires_a_style_and_writes_nothing() {
        let state = AppState::fake();
        create(&state, "u1", shopper()).await.unwrap();
        let err = complete_setup(&state, "u1", &prefs(vec![])).await.unwrap_err();
        assert_eq!(err.alert().message, "Please select at least one style.");
        assert!(!require(&state, "u1").await.unwrap().profile_complete);
    }

    #[tokio::test]
    async fn preferences_merge_without_touching_other_fields() {
        let state = AppState::fake();
        create(&state, "u1", shopper()).await.unwrap();
        let updated = update_preferences(&state, "u1", &prefs(vec![StylePref::Formal]))
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Ana");
        assert_eq!(updated.body_type, Some(BodyType::Normal));
    }

    #[tokio::test]
    async fn store_setup_needs_a_logo() {
        let state = AppState::fake();
        create(
            &state,
            "s1",
            NewProfile {
                role: Role::Seller,
                store_name: Some("Threads".into()),
                ..shopper()
            },
        )
        .await
        .unwrap();

        let err = complete_store_setup(&state, "s1", None, "hi").await.unwrap_err();
        assert_eq!(err.alert().message, "Please upload your store logo.");

        let logo = UploadFile {
            body: Bytes::from_static(b"png"),
            content_type: "image/png".into(),
        };
        let done = complete_store_setup(&state, "s1", Some(logo), "  Hand-made  ")
            .await
            .unwrap();
        assert!(done.profile_complete);
        assert_eq!(done.description.as_deref(), Some("Hand-made"));
        assert!(done
            .store_dp_url
            .as_deref()
            .is_some_and(|u| u.contains("seller_outfits/")));
    }

    #[tokio::test]
    async fn notifications_toggle_defaults_to_enabled() {
        let state = AppState::fake();
        create(&state, "u1", shopper()).await.unwrap();
        assert!(require(&state, "u1").await.unwrap().notifications_enabled());
        set_notifications(&state, "u1", false).await.unwrap();
        assert!(!require(&state, "u1").await.unwrap().notifications_enabled());
    }

    #[tokio::test]
    async fn rename_rejects_blank_names() {
        let state = AppState::fake();
        create(&state, "u1", shopper()).await.unwrap();
        assert!(rename(&state, "u1", "  ", "x").await.is_err());
        let p = rename(&state, "u1", "Sara", "Ali").await.unwrap();
        assert_eq!(p.display_name(), "Sara Ali");
    }
}
