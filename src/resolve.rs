// Three-tier module resolution: local override, then remote fetch, then the
// fallback cache. The first tier that produces source wins.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::LoaderError;
use crate::fetch::Fetcher;
use crate::store::fallback::FallbackCache;
use crate::store::overrides::OverrideStore;

/// Which tier produced a module's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Override,
    Remote,
    Cache,
}

impl Origin {
    /// Short marker used in logs and the load report.
    pub fn label(self) -> &'static str {
        match self {
            Origin::Override => "local override",
            Origin::Remote => "remote",
            Origin::Cache => "cached",
        }
    }
}

/// A module's source text plus where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub name: String,
    pub source: String,
    pub origin: Origin,
}

pub struct Resolver {
    overrides: OverrideStore,
    cache: FallbackCache,
    fetcher: Arc<Fetcher>,
}

impl Resolver {
    pub fn new(overrides: OverrideStore, cache: FallbackCache, fetcher: Arc<Fetcher>) -> Self {
        Self {
            overrides,
            cache,
            fetcher,
        }
    }

    /// Resolve one module. A failed tier logs and falls through to the next;
    /// [`LoaderError::ModuleUnavailable`] means all three came up empty.
    pub async fn resolve(&self, name: &str, remote_url: &str) -> Result<ResolvedModule, LoaderError> {
        // Tier 1: a local override skips the network entirely.
        match self.overrides.get(name) {
            Ok(Some(path)) => match tokio::fs::read_to_string(&path).await {
                Ok(source) => {
                    info!("module {} resolved from local override {}", name, path);
                    return Ok(ResolvedModule {
                        name: name.to_string(),
                        source,
                        origin: Origin::Override,
                    });
                }
                Err(e) => {
                    warn!("local override for {} unreadable ({}): {}", name, path, e);
                }
            },
            Ok(None) => {}
            Err(e) => warn!("override lookup failed for {}: {}", name, e),
        }

        // Tier 2: remote fetch. Success refreshes the fallback copy.
        match self.fetcher.fetch_text(remote_url).await {
            Ok(source) => {
                if let Err(e) = self.cache.put(name, &source) {
                    warn!("fallback write failed for {}: {}", name, e);
                }
                debug!("module {} resolved from {}", name, remote_url);
                return Ok(ResolvedModule {
                    name: name.to_string(),
                    source,
                    origin: Origin::Remote,
                });
            }
            Err(e) => warn!("remote tier failed for {}: {}", name, e),
        }

        // Tier 3: last known good copy, however stale.
        match self.cache.get(name) {
            Ok(Some(source)) => {
                info!("module {} resolved from fallback cache", name);
                Ok(ResolvedModule {
                    name: name.to_string(),
                    source,
                    origin: Origin::Cache,
                })
            }
            Ok(None) => Err(LoaderError::ModuleUnavailable {
                name: name.to_string(),
            }),
            Err(e) => {
                warn!("fallback read failed for {}: {}", name, e);
                Err(LoaderError::ModuleUnavailable {
                    name: name.to_string(),
                })
            }
        }
    }
}
