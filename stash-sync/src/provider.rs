//! The provider interface and per-cycle outcome types.
//!
//! A provider owns one remote copy of the lists and knows how to push the
//! local state to it and pull-merge its state back. The orchestrator treats
//! providers uniformly through [`SyncProvider`] and never talks to a remote
//! itself.
//!
//! # Design
//!
//! Sync is best-effort: a cycle runs pull then push and always attempts
//! both, so a broken pull cannot stop local data from reaching the remote
//! (and vice versa). Phase failures land in the [`ProviderReport`] instead
//! of aborting the cycle.

use async_trait::async_trait;

use stash_types::SyncSettings;

use crate::error::ProviderError;

/// Why a pull did not merge anything. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No remote copy, no timestamp on it, or nothing in its lists.
    NothingToMerge,
    /// The remote copy was written by this device.
    SameDevice,
    /// The provider has no credential or document to pull from.
    NotConfigured,
}

/// Outcome of one pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Remote data was merged into the local lists.
    Merged {
        /// Items in the merged lists after the write-back.
        items_merged: usize,
    },
    /// Nothing to do; local lists untouched.
    Skipped(SkipReason),
}

/// Outcome of one push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// Items the remote copy now holds.
    pub items_pushed: usize,
    /// Whether quota pressure forced the per-list cap below its
    /// configured value.
    pub truncated: bool,
    /// Where a human can look at the remote copy, if the remote has
    /// addressable documents.
    pub document_url: Option<String>,
}

/// What one provider did in one cycle.
#[derive(Debug)]
pub struct ProviderReport {
    /// The provider's [`name`](SyncProvider::name).
    pub provider: &'static str,
    /// The pull phase result.
    pub pull: Result<PullOutcome, ProviderError>,
    /// The push phase result.
    pub push: Result<PushOutcome, ProviderError>,
}

impl ProviderReport {
    /// True when the pull phase did not fail (skips count as success).
    pub fn pull_success(&self) -> bool {
        self.pull.is_ok()
    }

    /// True when the push phase did not fail.
    pub fn push_success(&self) -> bool {
        self.push.is_ok()
    }

    /// Items in the merged lists, zero if the pull skipped or failed.
    pub fn items_merged(&self) -> usize {
        match self.pull {
            Ok(PullOutcome::Merged { items_merged }) => items_merged,
            _ => 0,
        }
    }

    /// Items pushed to the remote, zero if the push failed.
    pub fn items_pushed(&self) -> usize {
        match &self.push {
            Ok(outcome) => outcome.items_pushed,
            Err(_) => 0,
        }
    }
}

/// One remote copy of the lists and the operations against it.
///
/// Implementations are constructor-injected with their transport and the
/// local store; they hold no global state and several can run side by side.
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// Whether this provider should run under `settings`.
    fn enabled(&self, settings: &SyncSettings) -> bool;

    /// Pull the remote copy and merge it into the local store.
    async fn pull(&self) -> Result<PullOutcome, ProviderError>;

    /// Push the local lists to the remote.
    async fn push(&self) -> Result<PushOutcome, ProviderError>;

    /// One full cycle: pull, then push. Both phases always run; failures
    /// are logged and folded into the report.
    async fn perform_sync(&self) -> ProviderReport {
        let pull = self.pull().await;
        if let Err(error) = &pull {
            tracing::warn!(provider = self.name(), %error, "pull failed");
        }
        let push = self.push().await;
        if let Err(error) = &push {
            tracing::warn!(provider = self.name(), %error, "push failed");
        }
        ProviderReport {
            provider: self.name(),
            pull,
            push,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Provider with canned phase results that records call order.
    struct ScriptedProvider {
        pull_fails: bool,
        push_fails: bool,
        phases: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ScriptedProvider {
        fn new(pull_fails: bool, push_fails: bool) -> Self {
            Self {
                pull_fails,
                push_fails,
                phases: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl SyncProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn enabled(&self, _settings: &SyncSettings) -> bool {
            true
        }

        async fn pull(&self) -> Result<PullOutcome, ProviderError> {
            self.phases.lock().unwrap().push("pull");
            if self.pull_fails {
                return Err(ProviderError::Transport("scripted pull failure".into()));
            }
            Ok(PullOutcome::Merged { items_merged: 7 })
        }

        async fn push(&self) -> Result<PushOutcome, ProviderError> {
            self.phases.lock().unwrap().push("push");
            if self.push_fails {
                return Err(ProviderError::Transport("scripted push failure".into()));
            }
            Ok(PushOutcome {
                items_pushed: 3,
                truncated: false,
                document_url: None,
            })
        }
    }

    #[tokio::test]
    async fn perform_sync_pulls_then_pushes() {
        let provider = ScriptedProvider::new(false, false);
        let report = provider.perform_sync().await;

        assert_eq!(*provider.phases.lock().unwrap(), vec!["pull", "push"]);
        assert!(report.pull_success());
        assert!(report.push_success());
        assert_eq!(report.items_merged(), 7);
        assert_eq!(report.items_pushed(), 3);
    }

    #[tokio::test]
    async fn failed_pull_never_blocks_the_push() {
        let provider = ScriptedProvider::new(true, false);
        let report = provider.perform_sync().await;

        assert_eq!(*provider.phases.lock().unwrap(), vec!["pull", "push"]);
        assert!(!report.pull_success());
        assert!(report.push_success());
        assert_eq!(report.items_merged(), 0);
        assert_eq!(report.items_pushed(), 3);
    }

    #[tokio::test]
    async fn failed_push_still_reports_the_merge() {
        let provider = ScriptedProvider::new(false, true);
        let report = provider.perform_sync().await;

        assert!(report.pull_success());
        assert!(!report.push_success());
        assert_eq!(report.items_merged(), 7);
        assert_eq!(report.items_pushed(), 0);
    }

    #[test]
    fn skips_count_as_pull_success_with_nothing_merged() {
        let report = ProviderReport {
            provider: "scripted",
            pull: Ok(PullOutcome::Skipped(SkipReason::SameDevice)),
            push: Ok(PushOutcome {
                items_pushed: 1,
                truncated: false,
                document_url: None,
            }),
        };
        assert!(report.pull_success());
        assert_eq!(report.items_merged(), 0);
    }
}
