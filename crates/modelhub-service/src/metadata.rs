//! The model metadata cache.

use std::sync::Arc;
use std::time::Duration;

use semver::Version;
use tokio::sync::Mutex;

use modelhub_cache::BoundedCache;
use modelhub_sources::{content_bucket_for_region, ObjectStore};

use crate::resolve;
use crate::{
    ContentKey, ContentPayload, ContentValue, ManifestIndex, MetadataError, ModelHeader,
    ModelSpecs, VersionedModelId,
};

/// The region metadata is served from when none is configured.
pub const DEFAULT_REGION: &str = "us-west-2";

/// The storage key of the manifest document.
pub const DEFAULT_MANIFEST_KEY: &str = "models_manifest.json";

const DEFAULT_CAPACITY: usize = 20;
const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Configuration for a [`ModelMetadataCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// The region to serve metadata from.
    pub region: String,
    /// The content bucket. When unset, it is derived from the region table
    /// (after consulting the environment override).
    pub bucket: Option<String>,
    /// The storage key of the manifest document.
    pub manifest_key: String,
    /// Capacity of the raw-content cache.
    pub content_capacity: usize,
    /// TTL of raw-content cache entries.
    pub content_ttl: Duration,
    /// Capacity of the resolution cache.
    pub resolution_capacity: usize,
    /// TTL of resolution cache entries.
    pub resolution_ttl: Duration,
    /// The library version used for compatibility filtering. Defaults to
    /// this crate's own version.
    pub library_version: Option<Version>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_owned(),
            bucket: None,
            manifest_key: DEFAULT_MANIFEST_KEY.to_owned(),
            content_capacity: DEFAULT_CAPACITY,
            content_ttl: DEFAULT_TTL,
            resolution_capacity: DEFAULT_CAPACITY,
            resolution_ttl: DEFAULT_TTL,
            library_version: None,
        }
    }
}

type ContentCache = BoundedCache<ContentKey, ContentValue>;
type ResolutionCache = BoundedCache<VersionedModelId, VersionedModelId>;

/// Resolves `(model id, version constraint)` pairs to validated model
/// metadata, backed by manifest/spec documents in an [`ObjectStore`].
///
/// Two bounded, expiring caches sit behind one coarse-grained mutex: the
/// raw-content cache (parsed manifest and spec documents) and the resolution
/// cache (constraint to concrete version). The resolution retrieval reads
/// through the raw-content cache, never the other way around.
///
/// Changing the region, bucket, or manifest key clears both caches, so no
/// lookup ever mixes data fetched under different configurations.
#[derive(Debug)]
pub struct ModelMetadataCache {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: Arc<dyn ObjectStore>,
    region: String,
    bucket: String,
    manifest_key: String,
    library_version: Version,
    content_cache: ContentCache,
    resolution_cache: ResolutionCache,
}

impl ModelMetadataCache {
    /// Creates a new cache reading from `store`.
    ///
    /// Fails with [`MetadataError::Configuration`] when no bucket is
    /// configured and the region is not in the launched-region table.
    pub fn new(store: Arc<dyn ObjectStore>, config: CacheConfig) -> Result<Self, MetadataError> {
        let bucket = match config.bucket {
            Some(bucket) => bucket,
            None => content_bucket_for_region(&config.region).ok_or_else(|| {
                MetadataError::Configuration(format!(
                    "no content bucket is known for region '{}'",
                    config.region
                ))
            })?,
        };
        let library_version = config.library_version.unwrap_or_else(crate_version);

        Ok(Self {
            inner: Mutex::new(Inner {
                store,
                region: config.region,
                bucket,
                manifest_key: config.manifest_key,
                library_version,
                content_cache: ContentCache::new(config.content_capacity, config.content_ttl),
                resolution_cache: ResolutionCache::new(
                    config.resolution_capacity,
                    config.resolution_ttl,
                ),
            }),
        })
    }

    /// Resolves the version constraint and returns the matching manifest
    /// entry.
    pub async fn get_header(
        &self,
        model_id: &str,
        version: &str,
    ) -> Result<ModelHeader, MetadataError> {
        self.inner.lock().await.get_header(model_id, version).await
    }

    /// Resolves the version constraint and returns the full spec document of
    /// the matching entry.
    pub async fn get_specs(
        &self,
        model_id: &str,
        version: &str,
    ) -> Result<Arc<ModelSpecs>, MetadataError> {
        self.inner.lock().await.get_specs(model_id, version).await
    }

    /// Returns all manifest entries, sorted by model id and version.
    pub async fn get_manifest(&self) -> Result<Vec<ModelHeader>, MetadataError> {
        self.inner.lock().await.get_manifest().await
    }

    /// Changes the region. A no-op if the region is unchanged; otherwise
    /// both sub-caches are cleared.
    pub async fn set_region(&self, region: &str) {
        let mut inner = self.inner.lock().await;
        if inner.region != region {
            inner.region = region.to_owned();
            inner.clear();
        }
    }

    /// Changes the manifest key. A no-op if unchanged; otherwise both
    /// sub-caches are cleared.
    pub async fn set_manifest_file_key(&self, manifest_key: &str) {
        let mut inner = self.inner.lock().await;
        if inner.manifest_key != manifest_key {
            inner.manifest_key = manifest_key.to_owned();
            inner.clear();
        }
    }

    /// Changes the content bucket. A no-op if unchanged; otherwise both
    /// sub-caches are cleared.
    pub async fn set_bucket_name(&self, bucket: &str) {
        let mut inner = self.inner.lock().await;
        if inner.bucket != bucket {
            inner.bucket = bucket.to_owned();
            inner.clear();
        }
    }

    /// Clears both sub-caches.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    /// The configured region.
    pub async fn region(&self) -> String {
        self.inner.lock().await.region.clone()
    }

    /// The configured content bucket.
    pub async fn bucket_name(&self) -> String {
        self.inner.lock().await.bucket.clone()
    }

    /// The configured manifest key.
    pub async fn manifest_file_key(&self) -> String {
        self.inner.lock().await.manifest_key.clone()
    }
}

impl Inner {
    async fn get_header(
        &mut self,
        model_id: &str,
        version: &str,
    ) -> Result<ModelHeader, MetadataError> {
        // The resolution cache can hold a concrete version the manifest no
        // longer contains, when the manifest was refreshed underneath a
        // still-fresh resolution. One full clear rebuilds both caches from
        // the same manifest fetch; a second miss cannot be self-healed.
        let mut attempt = 0;
        loop {
            let requested = VersionedModelId::new(model_id, version);
            let resolved = {
                let Inner {
                    resolution_cache,
                    content_cache,
                    store,
                    bucket,
                    manifest_key,
                    library_version,
                    ..
                } = self;
                resolution_cache
                    .get_with(requested, |key, _previous| {
                        resolve_model_version(
                            content_cache,
                            store,
                            bucket,
                            manifest_key,
                            library_version,
                            key,
                        )
                    })
                    .await?
            };

            let manifest = {
                let Inner {
                    content_cache,
                    store,
                    bucket,
                    manifest_key,
                    ..
                } = self;
                fetch_manifest(content_cache, store, bucket, manifest_key).await?
            };

            match manifest.get(&resolved) {
                Some(header) => return Ok(header.clone()),
                None if attempt == 0 => {
                    attempt += 1;
                    tracing::warn!(
                        resolved = %resolved,
                        "resolved version missing from manifest, clearing caches and retrying"
                    );
                    self.clear();
                }
                None => {
                    return Err(MetadataError::DataIntegrity(format!(
                        "resolved version '{resolved}' is missing from a freshly fetched manifest"
                    )));
                }
            }
        }
    }

    async fn get_specs(
        &mut self,
        model_id: &str,
        version: &str,
    ) -> Result<Arc<ModelSpecs>, MetadataError> {
        let header = self.get_header(model_id, version).await?;

        let Inner {
            content_cache,
            store,
            bucket,
            ..
        } = self;
        let value = content_cache
            .get_with(ContentKey::specs(header.spec_key.as_str()), |key, previous| {
                fetch_content(store, bucket, key, previous)
            })
            .await?;

        match value.payload {
            ContentPayload::Specs(specs) => Ok(specs),
            ContentPayload::Manifest(_) => Err(MetadataError::DataIntegrity(
                "spec cache entry holds a manifest document".to_owned(),
            )),
        }
    }

    async fn get_manifest(&mut self) -> Result<Vec<ModelHeader>, MetadataError> {
        let Inner {
            content_cache,
            store,
            bucket,
            manifest_key,
            ..
        } = self;
        let manifest = fetch_manifest(content_cache, store, bucket, manifest_key).await?;

        let mut headers: Vec<ModelHeader> = manifest.values().cloned().collect();
        headers.sort_by(|a, b| {
            a.model_id
                .cmp(&b.model_id)
                .then_with(|| a.version.cmp(&b.version))
        });
        Ok(headers)
    }

    fn clear(&mut self) {
        self.content_cache.clear();
        self.resolution_cache.clear();
    }
}

/// The retrieval function of the resolution cache.
async fn resolve_model_version(
    content_cache: &mut ContentCache,
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    manifest_key: &str,
    library_version: &Version,
    requested: VersionedModelId,
) -> Result<VersionedModelId, MetadataError> {
    let manifest = fetch_manifest(content_cache, store, bucket, manifest_key).await?;
    let header = resolve::select_header(&manifest, &requested, library_version)?;
    tracing::debug!(requested = %requested, resolved = %header.version, "resolved model version");
    Ok(header.versioned_id())
}

/// Fetches the manifest through the raw-content cache.
async fn fetch_manifest(
    content_cache: &mut ContentCache,
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    manifest_key: &str,
) -> Result<Arc<ManifestIndex>, MetadataError> {
    let value = content_cache
        .get_with(ContentKey::manifest(manifest_key), |key, previous| {
            fetch_content(store, bucket, key, previous)
        })
        .await?;

    match value.payload {
        ContentPayload::Manifest(index) => Ok(index),
        ContentPayload::Specs(_) => Err(MetadataError::DataIntegrity(
            "manifest cache entry holds a spec document".to_owned(),
        )),
    }
}

/// The retrieval function of the raw-content cache.
///
/// The manifest is fetched conditionally: its content hash is probed first,
/// and an unchanged hash short-circuits to the previously cached value
/// without downloading or reparsing. Spec documents are already addressed by
/// keys unique per manifest entry and are downloaded unconditionally.
async fn fetch_content(
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    key: ContentKey,
    previous: Option<ContentValue>,
) -> Result<ContentValue, MetadataError> {
    match key.file_type {
        crate::FileType::Manifest => {
            let hash = store.head(bucket, &key.key).await?;
            if let Some(previous) = previous {
                if previous.hash.as_deref() == Some(hash.as_str()) {
                    tracing::debug!(key = %key.key, "manifest unchanged, reusing cached copy");
                    return Ok(previous);
                }
            }

            tracing::debug!(key = %key.key, "downloading manifest");
            let bytes = store.get(bucket, &key.key).await?;
            let headers: Vec<ModelHeader> = serde_json::from_slice(&bytes)?;
            let index = build_manifest_index(headers)?;
            Ok(ContentValue {
                payload: ContentPayload::Manifest(Arc::new(index)),
                hash: Some(hash),
            })
        }
        crate::FileType::Specs => {
            tracing::debug!(key = %key.key, "downloading model specs");
            let bytes = store.get(bucket, &key.key).await?;
            let specs: ModelSpecs = serde_json::from_slice(&bytes)?;
            Ok(ContentValue {
                payload: ContentPayload::Specs(Arc::new(specs)),
                hash: None,
            })
        }
    }
}

/// Indexes manifest rows by `(model id, version)`.
///
/// Two rows with the same id and version make resolution ambiguous; rather
/// than letting one silently win, the whole manifest is rejected.
fn build_manifest_index(headers: Vec<ModelHeader>) -> Result<ManifestIndex, MetadataError> {
    let mut index = ManifestIndex::with_capacity(headers.len());
    for header in headers {
        let id = header.versioned_id();
        if index.insert(id.clone(), header).is_some() {
            return Err(MetadataError::DataIntegrity(format!(
                "manifest contains duplicate entries for '{id}'"
            )));
        }
    }
    Ok(index)
}

fn crate_version() -> Version {
    // CARGO_PKG_VERSION always parses; the fallback only keeps this path
    // panic-free.
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}
