// Operator console: manual control of the persistent stores, for developers
// pointing modules at local builds or flushing stale fallback copies.

use anyhow::Result;
use tracing::info;

use crate::store::fallback::FallbackCache;
use crate::store::overrides::OverrideStore;

/// Developer-facing surface over the override store and the fallback cache.
/// Every mutation is logged, so operator actions leave a trail in the
/// session output.
pub struct OperatorConsole {
    overrides: OverrideStore,
    cache: FallbackCache,
}

impl OperatorConsole {
    pub fn new(overrides: OverrideStore, cache: FallbackCache) -> Self {
        Self { overrides, cache }
    }

    /// Point `name` at a local file. The resolver prefers it over the
    /// network until the override is cleared.
    pub fn set_override(&self, name: &str, path: &str) -> Result<()> {
        self.overrides.set(name, path)?;
        info!("override set: {} -> {}", name, path);
        Ok(())
    }

    /// Remove the override for one module. Returns whether it existed.
    pub fn clear_override(&self, name: &str) -> Result<bool> {
        let existed = self.overrides.remove(name)?;
        if existed {
            info!("override cleared: {}", name);
        }
        Ok(existed)
    }

    /// Remove every override. Returns how many were removed.
    pub fn clear_overrides(&self) -> Result<usize> {
        let removed = self.overrides.clear()?;
        info!("cleared {} overrides", removed);
        Ok(removed)
    }

    /// Current overrides as (module name, local path) pairs, sorted by name.
    pub fn overrides(&self) -> Result<Vec<(String, String)>> {
        let mut listed = Vec::new();
        for name in self.overrides.names()? {
            if let Some(path) = self.overrides.get(&name)? {
                listed.push((name, path));
            }
        }
        Ok(listed)
    }

    /// Drop every fallback copy. Returns how many were removed.
    pub fn clear_cache(&self) -> Result<usize> {
        let removed = self.cache.clear()?;
        info!("cleared {} cached modules", removed);
        Ok(removed)
    }

    /// Names of modules with a fallback copy, sorted.
    pub fn cached_modules(&self) -> Result<Vec<String>> {
        self.cache.names()
    }
}
