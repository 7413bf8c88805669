//! Remote transports the providers are built on.
//!
//! Two seams, one per provider family:
//! - [`RemoteKv`] - a quota-limited key-value area (built-in provider)
//! - [`DocumentHost`] - named multi-file documents (gist provider)
//!
//! Each ships with an in-memory implementation so providers test without
//! a network: [`MemoryRemoteKv`] doubles as the embedder's in-process
//! remote, [`MockDocumentHost`] is the test double for the gist API.

pub mod gist;
pub mod kv;

pub use gist::{
    classify_status, DocumentFile, DocumentFiles, DocumentHandle, DocumentHost, GithubGists,
    HostError, MockDocumentHost, GITHUB_API_URL,
};
pub use kv::{KvError, MemoryRemoteKv, RemoteKv};
