//! The gist provider: sync through a private document on a document host.
//!
//! One document holds two files: a machine-readable data file with the full
//! snapshot and a human-readable summary. Unlike the built-in provider the
//! document is user-visible and the credential is user-supplied, so every
//! push is scanned for credential-shaped content before anything leaves the
//! process, and the settings block never travels in the data file.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let provider = GistProvider::new(GithubGists::new()?, store);
//! let login = provider.test_connection(&Token::new("ghp_...")).await?.login;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use stash_core::{merge, scan_payload};
use stash_store::LocalStore;
use stash_types::{ListName, SyncSettings, SyncSnapshot, Token};

use crate::error::ProviderError;
use crate::provider::{PullOutcome, PushOutcome, SkipReason, SyncProvider};
use crate::transport::{DocumentFile, DocumentFiles, DocumentHost, HostError};

/// Filename of the snapshot payload inside the document.
pub const DATA_FILE: &str = "tabstash-data.json";

/// Filename of the human-readable summary inside the document.
pub const SUMMARY_FILE: &str = "README.md";

/// Application label stamped into every pushed data file.
const SYNCED_FROM: &str = "tabstash-extension";

/// Result of a successful [`GistProvider::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTest {
    /// The login the credential authenticates as.
    pub login: String,
}

/// Sync provider over a [`DocumentHost`].
pub struct GistProvider<H> {
    host: H,
    store: Arc<dyn LocalStore>,
}

impl<H: DocumentHost> GistProvider<H> {
    /// Build a provider over `host`, persisting through `store`.
    pub fn new(host: H, store: Arc<dyn LocalStore>) -> Self {
        Self { host, store }
    }

    /// Verify that `token` works end to end: resolve the account, then
    /// create and delete a throwaway private document. Creating a document
    /// is what exercises the gist scope; resolving the account alone does
    /// not.
    pub async fn test_connection(&self, token: &Token) -> Result<ConnectionTest, ProviderError> {
        if token.is_empty() {
            return Err(ProviderError::Auth("no credential to test".to_owned()));
        }
        let login = self.host.viewer(token).await?;

        let mut files = DocumentFiles::new();
        files.insert(
            "test.txt".to_owned(),
            DocumentFile {
                content: "TabStash connection test".to_owned(),
            },
        );
        let handle = self
            .host
            .create_document(token, "TabStash connection test", files, false)
            .await?;
        if let Err(error) = self.host.delete_document(token, &handle.id).await {
            tracing::warn!(%error, id = %handle.id, "failed to delete connection-test document");
        }

        tracing::info!(%login, "connection test succeeded");
        Ok(ConnectionTest { login })
    }

    /// Delete the remote document and forget its handle. A document that
    /// is already gone counts as deleted.
    pub async fn delete_remote(&self) -> Result<(), ProviderError> {
        let mut settings = self.store.read_settings().await?;
        let id = match settings.gist.document_id.clone() {
            Some(id) => id,
            None => return Ok(()),
        };

        match self.host.delete_document(&settings.gist.token, &id).await {
            Ok(()) => tracing::info!(%id, "deleted remote document"),
            Err(HostError::NotFound(_)) => {
                tracing::debug!(%id, "remote document was already gone")
            }
            Err(error) => return Err(error.into()),
        }

        settings.gist.document_id = None;
        self.store.write_settings(&settings).await?;
        Ok(())
    }
}

fn render_summary(snapshot: &SyncSnapshot) -> String {
    let device = snapshot
        .device_id
        .as_ref()
        .map(|id| id.as_str())
        .unwrap_or("unknown");
    format!(
        "# TabStash Sync Data\n\n\
         This document contains synced data from the TabStash browser extension.\n\n\
         - **Read Later**: {} items\n\
         - **Tasks**: {} items\n\
         - **Last Synced**: {}\n\
         - **Device**: {}\n\n\
         *This document is managed automatically by TabStash. Do not edit manually.*\n",
        snapshot.lists.read_later.len(),
        snapshot.lists.tasks.len(),
        snapshot.last_synced_at.as_deref().unwrap_or("never"),
        device,
    )
}

#[async_trait]
impl<H: DocumentHost> SyncProvider for GistProvider<H> {
    fn name(&self) -> &'static str {
        "gist"
    }

    fn enabled(&self, settings: &SyncSettings) -> bool {
        settings.gist.is_configured()
    }

    async fn pull(&self) -> Result<PullOutcome, ProviderError> {
        let settings = self.store.read_settings().await?;
        let id = match &settings.gist.document_id {
            Some(id) if !settings.gist.token.is_empty() => id.clone(),
            _ => return Ok(PullOutcome::Skipped(SkipReason::NotConfigured)),
        };

        let files = self.host.get_document(&settings.gist.token, &id).await?;
        let data = files.get(DATA_FILE).ok_or_else(|| {
            ProviderError::Format(format!("remote document has no {DATA_FILE}"))
        })?;
        let remote: SyncSnapshot = serde_json::from_str(&data.content)
            .map_err(|error| ProviderError::Format(format!("remote data file: {error}")))?;

        let device = self.store.device_id().await?;
        if remote.is_from(&device) {
            tracing::debug!("remote document is our own write, skipping merge");
            return Ok(PullOutcome::Skipped(SkipReason::SameDevice));
        }

        let local = self.store.read_lists(&ListName::ALL).await?;
        let merged = merge(&local, &remote.lists);
        let items_merged = merged.total_items();
        self.store.replace_lists(&merged).await?;

        tracing::info!(items = items_merged, "merged remote document");
        Ok(PullOutcome::Merged { items_merged })
    }

    async fn push(&self) -> Result<PushOutcome, ProviderError> {
        let mut settings = self.store.read_settings().await?;
        if settings.gist.token.is_empty() {
            return Err(ProviderError::Auth("no credential configured".to_owned()));
        }

        let lists = self.store.read_lists(&ListName::ALL).await?;
        let device = self.store.device_id().await?;
        let snapshot = SyncSnapshot::new(lists, device)
            .with_origin(SYNCED_FROM, env!("CARGO_PKG_VERSION"));
        let payload = serde_json::to_string_pretty(&snapshot)?;

        // Runs before any request leaves the process; user content that
        // merely looks like a credential trips it too.
        scan_payload(&payload)?;

        let items_pushed = snapshot.lists.total_items();
        let mut files = DocumentFiles::new();
        files.insert(DATA_FILE.to_owned(), DocumentFile { content: payload });
        files.insert(
            SUMMARY_FILE.to_owned(),
            DocumentFile {
                content: render_summary(&snapshot),
            },
        );

        let token = &settings.gist.token;
        let description = settings.gist.description.clone();
        let handle = match &settings.gist.document_id {
            Some(id) => {
                self.host
                    .update_document(token, id, &description, files)
                    .await?
            }
            None => {
                let handle = self
                    .host
                    .create_document(token, &description, files, settings.gist.is_public)
                    .await?;
                tracing::info!(id = %handle.id, "created remote sync document");
                handle
            }
        };

        settings.gist.document_id = Some(handle.id);
        settings.gist.last_synced = snapshot.last_synced_at.clone();
        self.store.write_settings(&settings).await?;

        tracing::debug!(items = items_pushed, "pushed snapshot to the document host");
        Ok(PushOutcome {
            items_pushed,
            truncated: false,
            document_url: handle.url,
        })
    }
}
