// Load orchestration: one manifest fetch, then sequential resolve-and-execute
// over the three groups. Module failures are recorded, never propagated.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::manifest::{module_name, Manifest};
use super::report::{LoadReport, ModuleGroup, ModuleOutcome, ModuleStatus};
use crate::config::LoaderConfig;
use crate::console::OperatorConsole;
use crate::error::LoaderError;
use crate::fetch::Fetcher;
use crate::host::traits::ModuleHost;
use crate::registry::CapabilityRegistry;
use crate::resolve::Resolver;
use crate::store::fallback::FallbackCache;
use crate::store::kv::KvStore;
use crate::store::overrides::OverrideStore;
use crate::watch::{HostSignal, Presentation, RecoveryWatcher};

pub struct LoaderEngine {
    config: LoaderConfig,
    resolver: Resolver,
    host: Arc<dyn ModuleHost>,
    registry: Arc<CapabilityRegistry>,
    fetcher: Arc<Fetcher>,
    kv: Arc<KvStore>,
}

impl LoaderEngine {
    /// Wire stores, fetcher and resolver from `config`. The execution host is
    /// injected so embedders can substitute their own sandbox.
    pub fn new(config: LoaderConfig, host: Arc<dyn ModuleHost>) -> Result<Self> {
        let kv = Arc::new(KvStore::open(&config.state_dir)?);
        let overrides = OverrideStore::new(Arc::clone(&kv));
        let cache = FallbackCache::new(Arc::clone(&kv));
        let fetcher = Arc::new(Fetcher::new(
            config.fetch_attempts,
            Duration::from_millis(config.fetch_backoff_ms),
        ));
        let resolver = Resolver::new(overrides, cache, Arc::clone(&fetcher));
        let registry = Arc::new(CapabilityRegistry::new(config.duplicate_policy));

        Ok(Self {
            config,
            resolver,
            host,
            registry,
            fetcher,
            kv,
        })
    }

    /// The session registry, shared between the host and the launcher.
    pub fn registry(&self) -> Arc<CapabilityRegistry> {
        Arc::clone(&self.registry)
    }

    /// Operator surface over the persistent stores.
    pub fn console(&self) -> OperatorConsole {
        OperatorConsole::new(
            OverrideStore::new(Arc::clone(&self.kv)),
            FallbackCache::new(Arc::clone(&self.kv)),
        )
    }

    /// Start the recovery watcher with this engine's probe timings.
    pub fn watch(
        &self,
        presentation: Arc<dyn Presentation>,
        signals: mpsc::Receiver<HostSignal>,
    ) -> RecoveryWatcher {
        RecoveryWatcher::spawn(
            presentation,
            signals,
            Duration::from_millis(self.config.probe_interval_ms),
            Duration::from_millis(self.config.probe_settle_ms),
        )
    }

    /// Run one full load: fetch the manifest, then resolve and execute every
    /// entry in order. Only an unusable manifest fails the call; anything
    /// wrong with an individual module is recorded in the report and skipped.
    pub async fn load(&self) -> Result<LoadReport, LoaderError> {
        info!("fetching manifest {}", self.config.manifest_url);
        let text = self
            .fetcher
            .fetch_text(&self.config.manifest_url)
            .await
            .map_err(|e| {
                error!("manifest fetch failed: {}", e);
                LoaderError::ManifestUnavailable {
                    reason: e.to_string(),
                }
            })?;
        let manifest = Manifest::parse(&text).inspect_err(|e| error!("{}", e))?;

        let mut report = LoadReport::default();
        for url in &manifest.helpers {
            self.load_one(url, ModuleGroup::Helper, &mut report).await;
        }
        self.load_one(&manifest.launcher, ModuleGroup::Launcher, &mut report)
            .await;
        for url in &manifest.modules {
            self.load_one(url, ModuleGroup::Feature, &mut report).await;
        }

        info!(
            "load complete: {} loaded, {} skipped, {} capabilities registered",
            report.loaded(),
            report.skipped(),
            self.registry.len()
        );
        Ok(report)
    }

    async fn load_one(&self, url: &str, group: ModuleGroup, report: &mut LoadReport) {
        let name = module_name(url);
        let status = match self.resolver.resolve(&name, url).await {
            Ok(resolved) => match self.host.execute(&name, &resolved.source, &self.registry) {
                Ok(()) => {
                    info!(
                        "loaded {} {} ({})",
                        group.label(),
                        name,
                        resolved.origin.label()
                    );
                    ModuleStatus::Loaded(resolved.origin)
                }
                Err(e) => {
                    warn!("{}", e);
                    ModuleStatus::Failed(e.to_string())
                }
            },
            Err(e) => {
                warn!("skipping {} {}: {}", group.label(), name, e);
                ModuleStatus::Unavailable
            }
        };
        report.outcomes.push(ModuleOutcome {
            name,
            group,
            status,
        });
    }
}
