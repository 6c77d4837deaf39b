//! Admin dashboard: seller overview.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::AppError,
    profile::{services as profiles, Role, UserProfile},
    state::AppState,
    store::{CollectionRef, FieldFilter, StoreError},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/sellers", get(list_sellers))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerSummary {
    pub id: String,
    pub display_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dp_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_no: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SellerList {
    pub count: usize,
    pub sellers: Vec<SellerSummary>,
}

pub async fn sellers(state: &AppState, uid: &str) -> Result<SellerList, AppError> {
    let caller = profiles::load(state, uid).await?.map(|p| p.role);
    if caller != Some(Role::Admin) {
        return Err(AppError::Denied(Role::Admin.portal_denied()));
    }

    let filter = FieldFilter::eq("role", Role::Seller.as_str());
    let docs = state
        .store
        .query(&CollectionRef::new("users"), Some(&filter))
        .await?;
    let sellers = docs
        .into_iter()
        .map(|doc| {
            let profile: UserProfile = serde_json::from_value(Value::Object(doc.data))?;
            Ok(SellerSummary {
                id: doc.id,
                display_name: profile.display_name(),
                email: profile.email,
                store_name: profile.store_name,
                store_dp_url: profile.store_dp_url,
                contact_no: profile.contact_no,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()
        .map_err(StoreError::from)?;
    Ok(SellerList {
        count: sellers.len(),
        sellers,
    })
}

#[instrument(skip(state))]
pub async fn list_sellers(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SellerList>, AppError> {
    Ok(Json(sellers(&state, &user.doc_id()).await?))
}
