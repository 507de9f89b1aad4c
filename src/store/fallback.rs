use std::sync::Arc;

use anyhow::Result;

use super::kv::KvStore;

/// Filename prefix for fallback copies of module source.
pub const CACHE_PREFIX: &str = "cache_";

/// Last-known-good module sources, written on every successful remote fetch
/// and read only when the remote tier has given up. Entries may trail the
/// remote version by any number of sessions.
#[derive(Clone)]
pub struct FallbackCache {
    kv: Arc<KvStore>,
}

impl FallbackCache {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    /// Record `source` as the fallback copy for `name`.
    pub fn put(&self, name: &str, source: &str) -> Result<()> {
        self.kv.put(CACHE_PREFIX, name, source)
    }

    /// Fallback copy for `name`, if one was ever written.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        self.kv.get(CACHE_PREFIX, name)
    }

    /// Names with a fallback copy, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        self.kv.keys(CACHE_PREFIX)
    }

    /// Drop every fallback copy. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        self.kv.clear(CACHE_PREFIX)
    }
}
