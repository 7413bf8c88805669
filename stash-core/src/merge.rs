//! Snapshot merge for TabStash.
//!
//! This module reconciles two independently mutated copies of the saved-tab
//! lists into one consistent state. There is no conflict metadata beyond a
//! URL and a timestamp, so the rules are simple:
//!
//! - `url` is the merge identity: two items with the same url are the same
//!   logical entry, whole-item granularity (no field-level reconciliation).
//! - The item with the newer `savedAt` wins. A missing or malformed
//!   timestamp sorts as oldest and never fails the merge.
//! - On an exact timestamp tie the first-seen item wins, and local items
//!   are seen before remote items. Stable across runs.
//! - The merged list is ordered by `savedAt` descending; untimestamped
//!   items sink to the end.

use std::collections::HashMap;

use stash_types::{Item, SnapshotLists};

/// Merge two copies of the full list set, list by list.
///
/// Pure and deterministic. Idempotent over already-merged snapshots:
/// `merge(&s, &s)` reproduces `s` exactly.
pub fn merge(local: &SnapshotLists, remote: &SnapshotLists) -> SnapshotLists {
    SnapshotLists {
        read_later: merge_list(&local.read_later, &remote.read_later),
        tasks: merge_list(&local.tasks, &remote.tasks),
    }
}

/// Merge one list: union by url, newest `savedAt` wins, output descending.
pub fn merge_list(local: &[Item], remote: &[Item]) -> Vec<Item> {
    let mut survivors: Vec<Item> = Vec::with_capacity(local.len() + remote.len());
    let mut by_url: HashMap<&str, usize> = HashMap::new();

    for item in local.iter().chain(remote.iter()) {
        match by_url.get(item.url.as_str()) {
            Some(&slot) => {
                // Strictly newer replaces; a tie keeps the first-seen item.
                // None (missing/malformed savedAt) loses to any valid time.
                if item.saved_time() > survivors[slot].saved_time() {
                    survivors[slot] = item.clone();
                }
            }
            None => {
                by_url.insert(item.url.as_str(), survivors.len());
                survivors.push(item.clone());
            }
        }
    }

    // Stable sort keeps first-seen order among equal timestamps, so the
    // result is deterministic even though HashMap iteration is not involved.
    survivors.sort_by(|a, b| b.saved_time().cmp(&a.saved_time()));
    survivors
}
