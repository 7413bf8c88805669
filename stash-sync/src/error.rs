//! Provider error taxonomy.
//!
//! Every provider failure collapses into [`ProviderError`], classified by
//! what the caller can do about it: wait and retry (`Transport`, `Quota`),
//! fix the credential (`Auth`, `Authorization`), or treat the remote copy
//! as unusable (`Format`). Messages carry the failing rule or status, never
//! payload content or credentials.

use thiserror::Error;

use stash_core::{QuotaError, SecretLeak};
use stash_store::StoreError;

use crate::transport::{HostError, KvError};

/// Errors from sync providers, classified for the caller.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote could not be reached or answered unusably.
    #[error("transport: {0}")]
    Transport(String),

    /// The credential was rejected outright.
    #[error("authentication: {0}")]
    Auth(String),

    /// The credential is valid but not allowed to do this.
    #[error("authorization: {0}")]
    Authorization(String),

    /// A remote quota or rate limit refused the operation.
    #[error("quota: {0}")]
    Quota(String),

    /// The remote copy is missing a required part or does not parse.
    #[error("format: {0}")]
    Format(String),

    /// The outbound payload looked like it contained a credential.
    /// Nothing was sent.
    #[error("security violation: {0}")]
    SecurityViolation(#[from] SecretLeak),

    /// The local store failed underneath the provider.
    #[error("local store: {0}")]
    Store(#[from] StoreError),

    /// Local data could not be serialized for sending.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QuotaError> for ProviderError {
    fn from(error: QuotaError) -> Self {
        match error {
            QuotaError::EnvelopeTooLarge { .. } => Self::Quota(error.to_string()),
            QuotaError::Serialization(source) => Self::Serialization(source),
        }
    }
}

impl From<KvError> for ProviderError {
    fn from(error: KvError) -> Self {
        match error {
            KvError::QuotaExceeded(message) => Self::Quota(message),
            KvError::Unavailable(message) => Self::Transport(message),
        }
    }
}

impl From<HostError> for ProviderError {
    fn from(error: HostError) -> Self {
        match error {
            HostError::Auth(message) => Self::Auth(message),
            HostError::Scope(message) => Self::Authorization(message),
            HostError::RateLimited(message) => Self::Quota(message),
            // A vanished document is a data problem, not a connectivity one.
            HostError::NotFound(message) => Self::Format(message),
            HostError::Transport(message) => Self::Transport(message),
            HostError::UnexpectedResponse(message) => Self::Format(message),
        }
    }
}
