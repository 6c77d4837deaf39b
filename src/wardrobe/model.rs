use serde::{Deserialize, Serialize};

use crate::sync::SyncItem;

/// One photo in the user's wardrobe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardrobeItem {
    pub id: String,
    pub uri: String,
    pub custom_tag: String,
    pub category: String,
    /// Creation time, Unix millis.
    pub timestamp: i64,
}

impl SyncItem for WardrobeItem {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// `"{tag}||{category}___{millis}"`
pub fn item_id(tag: &str, category: &str, millis: i64) -> String {
    format!("{tag}||{category}___{millis}")
}

/// Pick an id not already used locally, moving the millis forward on a clash.
pub fn fresh_id(tag: &str, category: &str, millis: i64, taken: impl Fn(&str) -> bool) -> (String, i64) {
    let mut millis = millis;
    loop {
        let id = item_id(tag, category, millis);
        if !taken(&id) {
            return (id, millis);
        }
        millis += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_embeds_tag_and_category() {
        let id = item_id("black crop top", "Casual", 1_718_000_000_000);
        assert_eq!(id, "black crop top||Casual___1718000000000");
    }

    #[test]
    fn fresh_id_skips_taken_ids() {
        let taken = item_id("tee", "Party", 5);
        let (id, millis) = fresh_id("tee", "Party", 5, |c| c == taken);
        assert_eq!(millis, 6);
        assert_eq!(id, "tee||Party___6");
    }
}
