use serde::{Deserialize, Serialize};

use crate::sync::SyncItem;

pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerPost {
    pub id: String,
    pub images: Vec<String>,
    pub caption: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SyncItem for SellerPost {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

pub fn post_id(millis: i64) -> String {
    format!("post_{millis}")
}

/// `#`-prefixed tag, or `None` when nothing but the `#` would remain.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let tag = if raw.starts_with('#') {
        raw.to_string()
    } else {
        format!("#{raw}")
    };
    (tag.chars().count() > 1).then_some(tag)
}

/// Normalise and deduplicate, keeping first occurrences in order.
pub fn normalize_tags<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.into_iter().filter_map(normalize_tag) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Tag input box: whitespace separates tags.
pub fn parse_tags(input: &str) -> Vec<String> {
    normalize_tags(input.split_whitespace())
}
