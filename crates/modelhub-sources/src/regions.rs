//! The static region to content-bucket table.
//!
//! The hub publishes its manifest and spec documents to one bucket per
//! launched region. The bucket name can be overridden through the
//! environment, which takes precedence over the table; that is the hook used
//! to point a deployment at a staging bucket or a local S3 stand-in.

/// Environment variable overriding the content bucket name for all regions.
pub const CONTENT_BUCKET_OVERRIDE_VAR: &str = "MODELHUB_CONTENT_BUCKET";

/// Regions the hub content bucket has been launched in.
const LAUNCHED_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "eu-central-1",
    "eu-north-1",
    "eu-south-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
];

/// Returns the default content bucket for `region` from the static table.
///
/// Returns `None` for regions the hub has not been launched in.
pub fn default_bucket_for_region(region: &str) -> Option<String> {
    LAUNCHED_REGIONS
        .contains(&region)
        .then(|| format!("modelhub-cache-prod-{region}"))
}

/// Resolves the content bucket for `region`, consulting the
/// [`CONTENT_BUCKET_OVERRIDE_VAR`] environment variable before the static
/// table.
pub fn content_bucket_for_region(region: &str) -> Option<String> {
    match std::env::var(CONTENT_BUCKET_OVERRIDE_VAR) {
        Ok(bucket) if !bucket.is_empty() => {
            tracing::info!(bucket, "using content bucket override from environment");
            Some(bucket)
        }
        _ => default_bucket_for_region(region),
    }
}
