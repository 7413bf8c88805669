//! Sync configuration.
//!
//! Stored as one JSON object under the `settings` key. Every field carries a
//! serde default so a partial object written by an older build deep-merges
//! with the documented defaults on read.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A bearer credential for the document host.
///
/// Held in its own type so it zeroizes on drop and never reaches logs
/// through a Debug impl.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap a credential string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw credential, for building request headers.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no credential is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Token {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

// Intentionally opaque debug to avoid logging credentials
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token([REDACTED])")
    }
}

/// Settings for the built-in remote-store provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinSyncSettings {
    /// Whether the provider runs at all.
    #[serde(default = "default_builtin_enabled")]
    pub enabled: bool,
    /// Per-list item cap applied before every push.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Timer-triggered sync interval, in milliseconds.
    #[serde(default = "default_auto_sync_interval")]
    pub auto_sync_interval: u64,
}

impl BuiltinSyncSettings {
    /// The timer interval as a [`Duration`].
    pub fn sync_period(&self) -> Duration {
        Duration::from_millis(self.auto_sync_interval)
    }
}

impl Default for BuiltinSyncSettings {
    fn default() -> Self {
        Self {
            enabled: default_builtin_enabled(),
            max_items: default_max_items(),
            auto_sync_interval: default_auto_sync_interval(),
        }
    }
}

fn default_builtin_enabled() -> bool {
    true
}

fn default_max_items() -> usize {
    50
}

fn default_auto_sync_interval() -> u64 {
    300_000 // 5 minutes
}

/// Settings for the gist-backed provider.
///
/// The engine treats these as read-only except for `document_id` and
/// `last_synced`, which it records after a successful push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GistSyncSettings {
    /// Whether the provider runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Bearer credential for the document host.
    #[serde(default)]
    pub token: Token,
    /// Handle of the remote document, once one has been created.
    #[serde(default)]
    pub document_id: Option<String>,
    /// Whether a newly created document is publicly visible.
    #[serde(default)]
    pub is_public: bool,
    /// Description attached to a newly created document.
    #[serde(default = "default_description")]
    pub description: String,
    /// Timestamp of the last successful push, for UI display.
    #[serde(default)]
    pub last_synced: Option<String>,
}

impl GistSyncSettings {
    /// True when the provider is enabled and has a credential to use.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.token.is_empty()
    }
}

impl Default for GistSyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            token: Token::default(),
            document_id: None,
            is_public: false,
            description: default_description(),
            last_synced: None,
        }
    }
}

fn default_description() -> String {
    "TabStash - saved tabs".to_owned()
}

/// All sync settings, one per install.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Built-in remote-store provider settings.
    #[serde(default, rename = "builtinSync")]
    pub builtin: BuiltinSyncSettings,
    /// Gist-backed provider settings.
    #[serde(default, rename = "docSync")]
    pub gist: GistSyncSettings,
}
