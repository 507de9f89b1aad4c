// Capability registry: the session-scoped log of what loaded modules offer.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Context handed to a capability when it is invoked. The engine carries
/// these values verbatim; their meaning belongs to the embedding host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchContext {
    /// Credential the capability may present upstream.
    pub credential: String,
    /// Base URL of the host API the capability talks to.
    pub api_base: String,
    /// Free-form host descriptor (organization, tenant, account).
    pub org_info: serde_json::Value,
}

/// Invocation entry point a module exposed for one capability.
pub type InvokeFn = Arc<dyn Fn(&LaunchContext) -> anyhow::Result<()> + Send + Sync>;

/// Self-description a module registers while it executes.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub version: String,
    pub invoke: InvokeFn,
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// How [`CapabilityRegistry::list`] presents entries that share a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Every registration shows up, in registration order.
    #[default]
    KeepAll,
    /// The most recent registration per name shadows earlier ones.
    LastWins,
}

/// Append-only for the lifetime of a session: entries are never removed or
/// mutated once registered, and a repeated name appends a second entry. The
/// duplicate policy is applied when reading, not when writing.
pub struct CapabilityRegistry {
    entries: Mutex<Vec<CapabilityDescriptor>>,
    policy: DuplicatePolicy,
}

impl CapabilityRegistry {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            policy,
        }
    }

    /// Append a descriptor. Duplicate and empty names are allowed; both are
    /// flagged in the logs rather than rejected.
    pub fn register(&self, descriptor: CapabilityDescriptor) {
        if descriptor.name.is_empty() {
            warn!("capability registered with an empty name");
        }
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.name == descriptor.name) {
            warn!(
                "capability {} registered more than once, keeping both",
                descriptor.name
            );
        }
        entries.push(descriptor);
    }

    /// The launcher's view of the session, shaped by the duplicate policy.
    pub fn list(&self) -> Vec<CapabilityDescriptor> {
        let entries = self.entries.lock();
        match self.policy {
            DuplicatePolicy::KeepAll => entries.clone(),
            DuplicatePolicy::LastWins => {
                // Latest entry per name, in first-registration order.
                let mut out: Vec<CapabilityDescriptor> = Vec::new();
                for entry in entries.iter() {
                    match out.iter_mut().find(|e| e.name == entry.name) {
                        Some(slot) => *slot = entry.clone(),
                        None => out.push(entry.clone()),
                    }
                }
                out
            }
        }
    }

    /// The raw registration log, duplicates included.
    pub fn entries(&self) -> Vec<CapabilityDescriptor> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
