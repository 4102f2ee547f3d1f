//! The accessor handed to components that need model metadata.
//!
//! There is deliberately no module-level singleton: the host application
//! creates one [`ModelRegistry`] at startup and passes it to whatever needs
//! it.

use std::sync::Arc;

use crate::{MetadataError, ModelHeader, ModelMetadataCache, ModelSpecs};

/// A handle to one [`ModelMetadataCache`], with per-call region validation.
///
/// Callers can name the region they expect metadata to come from; a mismatch
/// with the cache's configured region fails eagerly, before any storage
/// request is made.
#[derive(Debug)]
pub struct ModelRegistry {
    cache: ModelMetadataCache,
}

impl ModelRegistry {
    /// Creates a registry around `cache`.
    pub fn new(cache: ModelMetadataCache) -> Self {
        Self { cache }
    }

    /// The underlying metadata cache.
    pub fn cache(&self) -> &ModelMetadataCache {
        &self.cache
    }

    /// Returns the manifest entry for `model_id` under the given version
    /// constraint.
    pub async fn get_model_header(
        &self,
        region: Option<&str>,
        model_id: &str,
        version: &str,
    ) -> Result<ModelHeader, MetadataError> {
        self.check_region(region).await?;
        self.cache.get_header(model_id, version).await
    }

    /// Returns the full spec document for `model_id` under the given version
    /// constraint.
    pub async fn get_model_specs(
        &self,
        region: Option<&str>,
        model_id: &str,
        version: &str,
    ) -> Result<Arc<ModelSpecs>, MetadataError> {
        self.check_region(region).await?;
        self.cache.get_specs(model_id, version).await
    }

    async fn check_region(&self, requested: Option<&str>) -> Result<(), MetadataError> {
        if let Some(requested) = requested {
            let configured = self.cache.region().await;
            if requested != configured {
                return Err(MetadataError::Configuration(format!(
                    "requested region '{requested}' conflicts with configured region '{configured}'"
                )));
            }
        }
        Ok(())
    }
}
