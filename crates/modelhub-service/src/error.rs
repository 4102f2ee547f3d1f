use modelhub_sources::StoreError;
use thiserror::Error;

/// An error that happens while resolving or fetching model metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The requested model id/version pair could not be resolved.
    ///
    /// The hint carries remediation guidance: the nearest alternative model
    /// id, the available versions, or the library version an upgrade to
    /// would make the requested version visible.
    #[error("model '{model_id}' version '{version}' could not be resolved: {hint}")]
    NotFound {
        /// The model id as requested.
        model_id: String,
        /// The version constraint as requested.
        version: String,
        /// Remediation guidance for the caller.
        hint: String,
    },

    /// The upstream manifest is corrupt, or the caches disagree with a
    /// freshly fetched manifest even after a full rebuild. Not retried.
    #[error("manifest integrity error: {0}")]
    DataIntegrity(String),

    /// A version string in the manifest or the request could not be parsed.
    #[error("invalid version string '{0}'")]
    InvalidVersion(String),

    /// The storage backend failed; propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A manifest or spec document failed to parse; propagated unchanged.
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Conflicting or unusable configuration, detected before any fetch.
    #[error("configuration error: {0}")]
    Configuration(String),
}
