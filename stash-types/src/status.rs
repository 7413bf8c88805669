//! Last-run sync outcome, persisted for UI consumption.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated outcome of one sync cycle across all enabled providers.
///
/// Overwritten every cycle; the UI reads it to render "last synced" state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// When the cycle finished.
    pub last_sync_time: String,
    /// Whether every attempted pull succeeded.
    pub pull_success: bool,
    /// Whether every attempted push succeeded.
    pub push_success: bool,
    /// Total items pushed to remotes this cycle.
    pub items_synced: usize,
    /// Total items in merged lists this cycle.
    pub items_merged: usize,
}

impl SyncStatus {
    /// Build a status record stamped with the current UTC time.
    pub fn now(
        pull_success: bool,
        push_success: bool,
        items_synced: usize,
        items_merged: usize,
    ) -> Self {
        Self {
            last_sync_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            pull_success,
            push_success,
            items_synced,
            items_merged,
        }
    }

    /// True when both phases succeeded.
    pub fn ok(&self) -> bool {
        self.pull_success && self.push_success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_as_camel_case() {
        let status = SyncStatus::now(true, false, 12, 34);
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"lastSyncTime\""));
        assert!(json.contains("\"pullSuccess\":true"));
        assert!(json.contains("\"pushSuccess\":false"));
        let back: SyncStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
        assert!(!back.ok());
    }
}
