use thiserror::Error;

/// Failure taxonomy for the load pipeline.
///
/// Only [`LoaderError::ManifestUnavailable`] aborts a load. The other
/// variants are confined to a single module and the engine records them and
/// moves on.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Every fetch attempt for a URL failed.
    #[error("fetch exhausted after {attempts} attempts: {url}")]
    NetworkExhausted { url: String, attempts: u32 },

    /// Override, remote and cache tiers all came up empty for a module.
    #[error("module {name} unavailable from override, remote or cache")]
    ModuleUnavailable { name: String },

    /// The manifest could not be fetched or was unusable.
    #[error("manifest unavailable: {reason}")]
    ManifestUnavailable { reason: String },

    /// A resolved module failed to compile, instantiate or initialize.
    #[error("module {name} failed to execute: {reason}")]
    ExecutionFailed { name: String, reason: String },
}
