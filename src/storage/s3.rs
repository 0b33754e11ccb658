//! AWS S3 cover store.
//!
//! Uploads cover images to a real S3 bucket with public-read access
//! and returns the bucket's virtual-hosted public URL for each object.
//!
//! Credentials are taken from the settings as static credentials; no
//! credential chain lookup happens at request time.

use std::future::Future;
use std::pin::Pin;

use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info, warn};

use super::{key_from_url, object_key, CoverStore};
use crate::config::StorageSettings;
use crate::errors::StorageError;

/// Cover store backed by an AWS S3 bucket.
pub struct S3CoverStore {
    /// AWS S3 SDK client.
    client: Client,
    /// Bucket receiving cover images.
    bucket: String,
    /// Region the bucket lives in (part of the public URL).
    region: String,
}

impl S3CoverStore {
    /// Create a new S3 cover store from the storage settings.
    pub async fn new(settings: &StorageSettings) -> Self {
        let creds = aws_sdk_s3::config::Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None, // session_token
            None, // expiry
            "bookswap-settings",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        let client = Client::new(&sdk_config);

        info!(
            "S3 cover store initialized: bucket={} region={}",
            settings.bucket, settings.region
        );

        Self {
            client,
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
        }
    }

    /// Map an AWS SDK error to a [`StorageError::Upload`] with context.
    fn upload_error(context: &str, err: impl std::fmt::Display) -> StorageError {
        StorageError::Upload {
            message: format!("S3 {context}: {err}"),
        }
    }
}

impl CoverStore for S3CoverStore {
    fn upload(
        &self,
        data: Bytes,
        original_filename: &str,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + '_>> {
        let key = object_key(original_filename);
        let content_type = content_type.to_string();
        Box::pin(async move {
            debug!("S3 put_object: bucket={} key={}", self.bucket, key);

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(aws_sdk_s3::primitives::ByteStream::from(data))
                .content_type(&content_type)
                .acl(ObjectCannedAcl::PublicRead)
                .send()
                .await
                .map_err(|e| Self::upload_error("put_object", e))?;

            Ok(public_url(&self.bucket, &self.region, &key))
        })
    }

    fn delete(&self, url: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let key = key_from_url(url).to_string();
        Box::pin(async move {
            debug!("S3 delete_object: bucket={} key={}", self.bucket, key);

            // S3 delete_object is idempotent -- no error for missing keys.
            match self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    warn!("S3 delete_object failed for key {key}: {e}");
                    false
                }
            }
        })
    }
}

/// Public URL of an object in a virtual-hosted-style bucket.
pub fn public_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_format() {
        assert_eq!(
            public_url("bookswap-covers", "us-east-1", "abc.jpg"),
            "https://bookswap-covers.s3.us-east-1.amazonaws.com/abc.jpg"
        );
    }

    #[test]
    fn test_public_url_round_trips_through_key_extraction() {
        let url = public_url("bookswap-covers", "eu-west-1", "4a5b.png");
        assert_eq!(key_from_url(&url), "4a5b.png");
    }
}
