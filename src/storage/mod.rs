//! Cover image storage backends.
//!
//! The [`CoverStore`] trait abstracts over where cover bytes physically
//! live.  Implementations include a gateway to AWS S3 and an in-memory
//! store for development and tests.

pub mod memory;
pub mod s3;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::errors::StorageError;

/// Async cover storage contract.
pub trait CoverStore: Send + Sync + 'static {
    /// Store `data` under a freshly derived key, returning the public
    /// URL of the stored object.
    fn upload(
        &self,
        data: Bytes,
        original_filename: &str,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + '_>>;

    /// Delete the object a previous `upload` returned `url` for.
    ///
    /// Reports `false` on any provider failure instead of erroring;
    /// callers treat cover deletion as best-effort.
    fn delete(&self, url: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Derive a collision-resistant object key from an uploaded filename:
/// a v4 UUID plus the original extension (`jpg` when absent).
pub fn object_key(original_filename: &str) -> String {
    let extension = original_filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("jpg");
    format!("{}.{}", uuid::Uuid::new_v4(), extension)
}

/// Resolve the object key a public URL points at: its trailing path
/// segment.
pub fn key_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_keeps_extension() {
        let key = object_key("cover.png");
        assert!(key.ends_with(".png"));
        // uuid (36 chars) + "." + extension
        assert_eq!(key.len(), 36 + 1 + 3);
    }

    #[test]
    fn test_object_key_defaults_to_jpg() {
        assert!(object_key("cover").ends_with(".jpg"));
        assert!(object_key("").ends_with(".jpg"));
        // A trailing dot carries no usable extension.
        assert!(object_key("cover.").ends_with(".jpg"));
    }

    #[test]
    fn test_object_key_uses_last_extension() {
        assert!(object_key("archive.tar.gz").ends_with(".gz"));
    }

    #[test]
    fn test_object_keys_unique() {
        assert_ne!(object_key("a.jpg"), object_key("a.jpg"));
    }

    #[test]
    fn test_key_from_url() {
        assert_eq!(
            key_from_url("https://covers.s3.us-east-1.amazonaws.com/abc-123.jpg"),
            "abc-123.jpg"
        );
        assert_eq!(key_from_url("no-slashes.jpg"), "no-slashes.jpg");
        assert_eq!(key_from_url("https://host/a/b/c.png"), "c.png");
    }
}
