use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::alerts::Alert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Seller => "seller",
            Self::Admin => "admin",
        }
    }

    /// Alert for an account that signs into a portal it does not belong to.
    pub fn portal_denied(self) -> Alert {
        let message = match self {
            Self::Seller => "This is not a seller account.",
            Self::Admin => "This account does not have admin privileges.",
            Self::User => "This is not a shopper account.",
        };
        Alert::new("Access Denied", message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    Slim,
    Normal,
    Fat,
    Veryfat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClothingSize {
    S,
    M,
    L,
    #[serde(rename = "XL")]
    Xl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StylePref {
    Formal,
    Casual,
    Pakistani,
    Modern,
}

/// The `users/{uid}` document, minus the synchronised array fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub profile_complete: bool,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<OffsetDateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_type: Option<BodyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clothing_size: Option<ClothingSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin_tone: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub style_prefs: Vec<StylePref>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dp_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    /// Unset means enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
}

impl UserProfile {
    /// `"{firstName} {lastName}"`, or the role's generic name when both are blank.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if !name.is_empty() {
            return name;
        }
        match self.role {
            Role::Seller => "Seller".into(),
            Role::User | Role::Admin => "User".into(),
        }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.unwrap_or(true)
    }

    pub fn landing(&self) -> Landing {
        match (self.role, self.profile_complete) {
            (Role::Admin, _) => Landing::AdminHome,
            (Role::User, false) => Landing::ProfileSetup,
            (Role::Seller, false) => Landing::StoreSetup,
            (Role::User, true) => Landing::UserHome,
            (Role::Seller, true) => Landing::SellerHome,
        }
    }
}

/// Where the app goes after sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Landing {
    ProfileSetup,
    StoreSetup,
    UserHome,
    SellerHome,
    AdminHome,
}

/// Preview colour for a skin tone slider value in `[0, 1]`.
pub fn skin_color(tone: f64) -> String {
    const DARK: (f64, f64, f64) = (62.0, 40.0, 23.0);
    const LIGHT: (f64, f64, f64) = (248.0, 210.0, 170.0);
    let t = if tone.is_finite() { tone.clamp(0.0, 1.0) } else { 0.5 };
    let mix = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    format!(
        "rgb({},{},{})",
        mix(DARK.0, LIGHT.0),
        mix(DARK.1, LIGHT.1),
        mix(DARK.2, LIGHT.2)
    )
}
