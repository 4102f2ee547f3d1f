//! Support for reading hub content from S3 buckets.

use std::fmt;
use std::sync::Arc;

use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::Client;
pub use aws_sdk_s3::Error as S3Error;
use futures::future::BoxFuture;

use crate::{ObjectStore, StoreError};

type ClientCache = moka::future::Cache<String, Arc<Client>>;

/// An [`ObjectStore`] backed by S3.
///
/// Clients are constructed lazily per region and reused across requests.
/// Credentials come from the default provider chain; the hub content buckets
/// are publicly readable, so in most deployments no credentials are needed
/// at all.
pub struct S3Store {
    region: String,
    credentials: Option<Credentials>,
    client_cache: ClientCache,
}

impl fmt::Debug for S3Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Store")
            .field("region", &self.region)
            .finish()
    }
}

impl S3Store {
    /// Creates a store issuing requests against `region`.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            credentials: None,
            client_cache: ClientCache::new(4),
        }
    }

    /// Creates a store authenticating with an explicit key pair instead of
    /// the default provider chain. Needed when the content bucket override
    /// points at a private bucket.
    pub fn with_credentials(
        region: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            credentials: Some(Credentials::from_keys(access_key, secret_key, None)),
            client_cache: ClientCache::new(4),
        }
    }

    async fn client(&self) -> Arc<Client> {
        let init = Box::pin(async {
            tracing::debug!(region = %self.region, "constructing S3 client");
            let mut loader = aws_config::from_env().region(Region::new(self.region.clone()));
            if let Some(credentials) = &self.credentials {
                loader = loader.credentials_provider(credentials.clone());
            }
            let config = loader.load().await;
            Arc::new(Client::new(&config))
        });

        self.client_cache
            .entry_by_ref(&self.region)
            .or_insert_with(init)
            .await
            .into_value()
    }
}

impl ObjectStore for S3Store {
    fn head<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move {
            tracing::debug!("probing s3://{bucket}/{key}");
            let client = self.client().await;
            let response = client
                .head_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(map_sdk_error)?;

            response
                .e_tag()
                .map(|etag| etag.trim_matches('"').to_owned())
                .ok_or_else(|| StoreError::Fetch("response carried no etag".to_owned()))
        })
    }

    fn get<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
        Box::pin(async move {
            tracing::debug!("fetching s3://{bucket}/{key}");
            let client = self.client().await;
            let response = client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(map_sdk_error)?;

            let body = response
                .body
                .collect()
                .await
                .map_err(|err| StoreError::Fetch(err.to_string()))?;
            Ok(body.into_bytes().to_vec())
        })
    }
}

/// Maps an SDK error onto [`StoreError`].
///
/// The errors and status codes are explained here:
/// <https://docs.aws.amazon.com/AmazonS3/latest/API/ErrorResponses.html#ErrorCodeList>
fn map_sdk_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    S3Error: From<SdkError<E, R>>,
{
    let err = S3Error::from(err);
    match &err {
        S3Error::NoSuchBucket(_) | S3Error::NoSuchKey(_) | S3Error::NotFound(_) => {
            StoreError::NotFound
        }
        // Some service errors only identify themselves through the `code`.
        _ if matches!(err.code(), Some("NoSuchBucket" | "NoSuchKey" | "NotFound")) => {
            StoreError::NotFound
        }
        _ if matches!(
            err.code(),
            Some(
                "AccessDenied"
                    | "InvalidAccessKeyId"
                    | "SignatureDoesNotMatch"
                    | "AuthorizationHeaderMalformed"
            )
        ) =>
        {
            StoreError::PermissionDenied(err.to_string())
        }
        _ => StoreError::Fetch(err.to_string()),
    }
}
