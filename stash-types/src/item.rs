//! A saved tab and the lists it can live in.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ItemId;

/// The two lists a tab can be saved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListName {
    /// Tabs saved to read later.
    ReadLater,
    /// Tabs saved as tasks.
    Tasks,
}

impl ListName {
    /// Both list names, in storage order.
    pub const ALL: [ListName; 2] = [ListName::ReadLater, ListName::Tasks];

    /// The storage key for this list.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListName::ReadLater => "readLater",
            ListName::Tasks => "tasks",
        }
    }
}

impl fmt::Display for ListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved tab.
///
/// `url` is the merge identity: two items with the same url are the same
/// logical entry, and the one with the newer [`saved_at`](Item::saved_at)
/// wins a merge. `id` is only used for local deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Locally assigned id; not unique across devices.
    #[serde(default = "ItemId::generate")]
    pub id: ItemId,
    /// The saved URL; merge identity key.
    pub url: String,
    /// Page title, if the tab had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Favicon URL, if the tab had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    /// Free-text annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// ISO-8601 save timestamp; merge tie-breaker. May be absent or
    /// malformed in data written by other devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl Item {
    /// Create a new item stamped with a fresh id and the current UTC time.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: ItemId::generate(),
            url: url.into(),
            title: None,
            fav_icon_url: None,
            note: None,
            saved_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    /// Set the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the favicon URL.
    pub fn with_fav_icon(mut self, url: impl Into<String>) -> Self {
        self.fav_icon_url = Some(url.into());
        self
    }

    /// Set the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Parse `saved_at` leniently.
    ///
    /// Returns `None` for a missing or malformed timestamp, so broken data
    /// sorts below every valid timestamp instead of failing the merge.
    pub fn saved_time(&self) -> Option<DateTime<Utc>> {
        self.saved_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_has_parseable_timestamp() {
        let item = Item::new("https://example.com");
        assert!(item.saved_time().is_some());
    }

    #[test]
    fn malformed_saved_at_parses_to_none() {
        let mut item = Item::new("https://example.com");
        item.saved_at = Some("not a date".into());
        assert!(item.saved_time().is_none());

        item.saved_at = None;
        assert!(item.saved_time().is_none());
    }

    #[test]
    fn wire_format_is_camel_case() {
        let item = Item::new("https://example.com")
            .with_title("Example")
            .with_fav_icon("https://example.com/favicon.ico");
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"favIconUrl\""));
        assert!(json.contains("\"savedAt\""));
        // Unset optionals stay off the wire entirely.
        assert!(!json.contains("\"note\""));
    }

    #[test]
    fn deserializes_legacy_item_without_id() {
        let json = r#"{"url":"https://example.com","savedAt":"2024-01-01T00:00:00.000Z"}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert!(!item.id.as_str().is_empty());
        assert!(item.saved_time().is_some());
    }

    #[test]
    fn list_name_round_trips_as_storage_key() {
        for name in ListName::ALL {
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, format!("\"{}\"", name.as_str()));
            let back: ListName = serde_json::from_str(&json).unwrap();
            assert_eq!(back, name);
        }
    }
}
