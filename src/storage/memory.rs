//! In-memory cover store.
//!
//! Covers are held in a `tokio::sync::RwLock<HashMap<...>>` keyed by
//! object key.  Used for development and router tests; nothing persists
//! across restarts.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use super::{key_from_url, object_key, CoverStore};
use crate::errors::StorageError;

/// Cover store that keeps everything in process memory.
///
/// Returned URLs use a `memory://covers/{key}` form so the delete path
/// exercises the same trailing-segment key extraction as the S3 store.
#[derive(Default)]
pub struct MemoryCoverStore {
    /// key -> (data, content_type).
    objects: tokio::sync::RwLock<HashMap<String, (Bytes, String)>>,
}

impl MemoryCoverStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored covers.
    pub async fn count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Fetch a stored cover by key.
    pub async fn get(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.read().await.get(key).cloned()
    }
}

impl CoverStore for MemoryCoverStore {
    fn upload(
        &self,
        data: Bytes,
        original_filename: &str,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String, StorageError>> + Send + '_>> {
        let key = object_key(original_filename);
        let content_type = content_type.to_string();
        Box::pin(async move {
            let mut objects = self.objects.write().await;
            objects.insert(key.clone(), (data, content_type));
            Ok(format!("memory://covers/{key}"))
        })
    }

    fn delete(&self, url: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let key = key_from_url(url).to_string();
        Box::pin(async move {
            // Mirrors S3 semantics: deleting a missing key still succeeds.
            self.objects.write().await.remove(&key);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_get() {
        let store = MemoryCoverStore::new();
        let url = store
            .upload(Bytes::from_static(b"fake png"), "cover.png", "image/png")
            .await
            .unwrap();
        assert!(url.starts_with("memory://covers/"));
        assert!(url.ends_with(".png"));
        assert_eq!(store.count().await, 1);

        let (data, content_type) = store.get(key_from_url(&url)).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"fake png"));
        assert_eq!(content_type, "image/png");
    }

    #[tokio::test]
    async fn test_delete_removes_and_is_idempotent() {
        let store = MemoryCoverStore::new();
        let url = store
            .upload(Bytes::from_static(b"x"), "a.jpg", "image/jpeg")
            .await
            .unwrap();

        assert!(store.delete(&url).await);
        assert_eq!(store.count().await, 0);
        // Second delete still reports success.
        assert!(store.delete(&url).await);
    }
}
