//! Bootstrap engine for remotely-hosted tool modules.
//!
//! A manifest names module URLs in three groups (helpers, a launcher,
//! feature modules). Each module is resolved through a local override, the
//! network, or a fallback cache of last known good copies, then executed in
//! a sandboxed host where it registers capabilities. A recovery watcher
//! keeps the launcher surface alive across host UI resets.

use std::sync::Once;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod host;
pub mod registry;
pub mod resolve;
pub mod store;
pub mod watch;

pub use config::LoaderConfig;
pub use console::OperatorConsole;
pub use engine::loader::LoaderEngine;
pub use engine::report::{LoadReport, ModuleGroup, ModuleOutcome, ModuleStatus};
pub use error::LoaderError;
pub use host::traits::ModuleHost;
pub use host::wasm::WasmHost;
pub use registry::{
    CapabilityDescriptor, CapabilityRegistry, DuplicatePolicy, InvokeFn, LaunchContext,
};
pub use resolve::Origin;
pub use watch::{HostSignal, Presentation, RecoveryWatcher};

static INIT_TRACING: Once = Once::new();

/// Install a default tracing subscriber for embedders that do not bring
/// their own. Safe to call more than once.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        info!("loader tracing initialized");
    });
}
