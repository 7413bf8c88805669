//! Pre-upload payload scan.
//!
//! The gist document is world-readable when configured public, and even a
//! private one lives on someone else's server, so every push is scanned
//! before any network call. The scan is blunt: it looks for
//! quoted JSON keys with sensitive names and for credential-shaped
//! substrings anywhere in the payload, and a hit aborts the push. False
//! positives (a note containing a quoted `"token"`) are accepted; a leaked
//! credential is not.

use thiserror::Error;

/// JSON key names that must never appear in an uploaded payload.
///
/// Matched as `"name"` (quoted, lowercased), which catches both keys and
/// exact string values.
const SENSITIVE_KEYS: [&str; 7] = [
    "token",
    "password",
    "secret",
    "credential",
    "auth",
    "key",
    "settings",
];

/// Prefixes of hosting-service credentials, matched anywhere.
const CREDENTIAL_PREFIXES: [&str; 2] = ["ghp_", "github_pat_"];

/// A payload was rejected before upload.
///
/// `pattern` names the rule that fired, never the surrounding payload
/// content, so the error itself is safe to log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payload contains sensitive-looking content (matched {pattern})")]
pub struct SecretLeak {
    /// The pattern that matched.
    pub pattern: String,
}

/// Scan a serialized payload for credential-shaped content.
///
/// Runs on every push, unconditionally. Case-insensitive.
pub fn scan_payload(payload: &str) -> Result<(), SecretLeak> {
    let lowered = payload.to_lowercase();

    for key in SENSITIVE_KEYS {
        let needle = format!("\"{key}\"");
        if lowered.contains(&needle) {
            return Err(SecretLeak { pattern: needle });
        }
    }

    for prefix in CREDENTIAL_PREFIXES {
        if lowered.contains(prefix) {
            return Err(SecretLeak {
                pattern: prefix.to_owned(),
            });
        }
    }

    Ok(())
}
