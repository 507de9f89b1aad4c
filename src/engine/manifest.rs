use serde::Deserialize;

use crate::error::LoaderError;

/// The manifest document: three groups of module URLs, loaded in the fixed
/// order helpers, launcher, modules. Fetched fresh every session and never
/// persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Shared-utility modules, executed before everything else.
    #[serde(default)]
    pub helpers: Vec<String>,
    /// The launcher module. The one required entry.
    pub launcher: String,
    /// Feature modules, executed after the launcher.
    #[serde(default)]
    pub modules: Vec<String>,
}

impl Manifest {
    /// Parse a fetched manifest document. A document that does not decode,
    /// or decodes without a usable launcher, is fatal for the load.
    pub fn parse(text: &str) -> Result<Self, LoaderError> {
        let manifest: Manifest =
            serde_json::from_str(text).map_err(|e| LoaderError::ManifestUnavailable {
                reason: format!("malformed document: {}", e),
            })?;
        if manifest.launcher.trim().is_empty() {
            return Err(LoaderError::ManifestUnavailable {
                reason: "no launcher entry".to_string(),
            });
        }
        Ok(manifest)
    }
}

/// Module identity: the trailing path segment of the source URL, with any
/// query or fragment stripped. Applied uniformly, launcher included.
pub fn module_name(url: &str) -> String {
    let base = url.split(['?', '#']).next().unwrap_or(url);
    let trimmed = base.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
}
