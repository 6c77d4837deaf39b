use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::store::Document;

pub const DEFAULT_TITLE: &str = "New Message";
pub const DEFAULT_BODY: &str = "You have a new message";

/// A record in `users/{uid}/notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl Notification {
    pub fn unread(title: &str, body: &str) -> Self {
        Self {
            id: String::new(),
            title: title.to_string(),
            body: body.to_string(),
            read: false,
            created_at: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let mut note: Self = serde_json::from_value(Value::Object(doc.data))?;
        note.id = doc.id;
        Ok(note)
    }
}

/// A push message received while the app is in the foreground.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForegroundMessage {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl ForegroundMessage {
    pub fn into_notification(self) -> Notification {
        let pick = |v: Option<String>, fallback: &str| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        Notification::unread(
            &pick(self.title, DEFAULT_TITLE),
            &pick(self.body, DEFAULT_BODY),
        )
    }
}
