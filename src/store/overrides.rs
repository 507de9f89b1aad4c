use std::sync::Arc;

use anyhow::Result;

use super::kv::KvStore;

/// Filename prefix that separates override entries from cache entries.
pub const OVERRIDE_PREFIX: &str = "override_";

/// Durable mapping from module name to a local file path. Overrides are set
/// by an operator and survive restarts; the resolver consults them before
/// touching the network.
#[derive(Clone)]
pub struct OverrideStore {
    kv: Arc<KvStore>,
}

impl OverrideStore {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    /// Point `name` at a local file path.
    pub fn set(&self, name: &str, path: &str) -> Result<()> {
        self.kv.put(OVERRIDE_PREFIX, name, path)
    }

    /// Local path registered for `name`, if any.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        self.kv.get(OVERRIDE_PREFIX, name)
    }

    /// Drop the override for `name`. Returns whether one existed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        self.kv.remove(OVERRIDE_PREFIX, name)
    }

    /// Names with an override, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        self.kv.keys(OVERRIDE_PREFIX)
    }

    /// Drop every override. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        self.kv.clear(OVERRIDE_PREFIX)
    }
}
