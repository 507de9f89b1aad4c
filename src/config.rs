use serde::Deserialize;

use crate::registry::DuplicatePolicy;

/// Number of fetch attempts before the remote tier gives up on a URL.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Base delay for linear retry backoff (attempt N waits N times this).
pub const DEFAULT_FETCH_BACKOFF_MS: u64 = 1_000;

/// How often the recovery watcher probes for the launcher anchor.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 2_000;

/// Settle delay after a navigation signal before the next probe.
pub const DEFAULT_PROBE_SETTLE_MS: u64 = 500;

/// Top-level configuration for the loader engine.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// URL of the manifest document, fetched fresh on every load.
    pub manifest_url: String,
    /// Directory holding persisted overrides and cached module sources.
    pub state_dir: String,
    /// Fetch attempt ceiling applied to every remote request.
    pub fetch_attempts: u32,
    /// Linear backoff base in milliseconds.
    pub fetch_backoff_ms: u64,
    /// Anchor probe cadence in milliseconds.
    pub probe_interval_ms: u64,
    /// Settle delay in milliseconds between a navigation signal and its probe.
    pub probe_settle_ms: u64,
    /// How the registry presents entries that share a name.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            manifest_url: String::new(),
            state_dir: String::new(),
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            fetch_backoff_ms: DEFAULT_FETCH_BACKOFF_MS,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            probe_settle_ms: DEFAULT_PROBE_SETTLE_MS,
            duplicate_policy: DuplicatePolicy::KeepAll,
        }
    }
}
