//! # stash-sync
//!
//! Sync engine for TabStash: providers, remote transports, and the
//! orchestrator that decides when cycles run.
//!
//! This is the crate applications wire together to keep saved-tab lists
//! converging across devices.
//!
//! ## Features
//!
//! - **Built-in provider**: quota-limited key/value sync area shared by
//!   every device on the same account, with legacy layout migration
//! - **Gist provider**: a GitHub Gist as the shared document, secret-scanned
//!   before anything leaves the process
//! - **Transport Abstraction**: pluggable remotes ([`RemoteKv`],
//!   [`DocumentHost`]) with in-memory doubles for tests
//! - **Pure Scheduling**: the orchestrator interprets the `stash-core`
//!   state machine; all timing policy stays testable without I/O
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stash_store::JsonFileStore;
//! use stash_sync::{
//!     BuiltinProvider, GistProvider, GithubGists, MemoryRemoteKv,
//!     Orchestrator, OrchestratorConfig, SyncProvider,
//! };
//!
//! let store = Arc::new(JsonFileStore::open("./stash").await?);
//! let providers: Vec<Arc<dyn SyncProvider>> = vec![
//!     Arc::new(BuiltinProvider::new(MemoryRemoteKv::new(), store.clone())),
//!     Arc::new(GistProvider::new(GithubGists::new()?, store.clone())),
//! ];
//!
//! let settings = store.read_settings().await?;
//! let mut orchestrator = Orchestrator::new(
//!     store,
//!     providers,
//!     OrchestratorConfig::from_settings(&settings),
//! );
//! orchestrator.start();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtin;
pub mod error;
pub mod gist;
pub mod orchestrator;
pub mod provider;
pub mod transport;

pub use builtin::{BuiltinProvider, SHARED_SYNC_KEY};
pub use error::ProviderError;
pub use gist::{ConnectionTest, GistProvider, DATA_FILE, SUMMARY_FILE};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use provider::{ProviderReport, PullOutcome, PushOutcome, SkipReason, SyncProvider};
pub use transport::{
    DocumentFile, DocumentFiles, DocumentHandle, DocumentHost, GithubGists, HostError, KvError,
    MemoryRemoteKv, MockDocumentHost, RemoteKv, GITHUB_API_URL,
};
