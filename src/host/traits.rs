use crate::error::LoaderError;
use crate::registry::CapabilityRegistry;

/// Execution sandbox for resolved module source.
///
/// Implementations run each module in an isolated scope and must contain its
/// failures: a bad module returns [`LoaderError::ExecutionFailed`] and leaves
/// the host usable for the next one. The registry is the only channel from a
/// module back into the engine.
pub trait ModuleHost: Send + Sync {
    /// Run one module's initialization to completion, forwarding whatever it
    /// registers into `registry`.
    fn execute(
        &self,
        name: &str,
        source: &str,
        registry: &CapabilityRegistry,
    ) -> Result<(), LoaderError>;
}
