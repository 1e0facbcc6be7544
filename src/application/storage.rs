//! Cloud persistence for rendered rasters.
//!
//! [`PersistenceGateway`] is what the render pipeline depends on; [`OssGateway`]
//! implements it over any [`ObjectStore`] client, owning key layout, timeouts
//! and signed URL generation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_UPLOAD_PATH: &str = "formula-images";
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(3600 * 24 * 365);
const PNG_SUFFIX: &str = ".png";
const PNG_CONTENT_TYPE: &str = "image/png";

/// Errors returned by object storage clients.
#[derive(Debug, Clone, Error)]
pub enum ObjectStoreError {
    #[error("object `{key}` not found")]
    NotFound { key: String },
    #[error("request timed out")]
    Timeout,
    #[error("storage responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid storage configuration: {0}")]
    Configuration(String),
}

impl ObjectStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ObjectStoreError::NotFound { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub timeout: Option<Duration>,
    pub content_type: Option<String>,
    /// User metadata, sent as `x-oss-meta-*` headers.
    pub metadata: BTreeMap<String, String>,
}

/// Minimal object storage client surface consumed by the gateway.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> Result<(), ObjectStoreError>;

    /// Time-limited URL granting read access to `key` to whoever holds it.
    fn signed_url(&self, key: &str, expires: Duration) -> Result<String, ObjectStoreError>;

    /// Metadata-only probe. Missing objects yield [`ObjectStoreError::NotFound`].
    async fn head(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("upload failed: {cause}")]
    Upload { cause: String },
    #[error("existence check failed: {cause}")]
    Probe { cause: String },
    #[error("delete failed: {cause}")]
    Delete { cause: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// Signed, time-limited URL.
    pub url: String,
    pub filename: String,
    pub key: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Key prefix; defaults to the gateway's configured path.
    pub path: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        options: UploadOptions,
    ) -> Result<UploadResult, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Missing objects count as deleted.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub default_path: String,
    pub timeout: Duration,
    pub url_expiry: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            default_path: DEFAULT_UPLOAD_PATH.to_string(),
            timeout: DEFAULT_UPLOAD_TIMEOUT,
            url_expiry: DEFAULT_URL_EXPIRY,
        }
    }
}

pub struct OssGateway {
    store: Arc<dyn ObjectStore>,
    settings: GatewaySettings,
}

impl OssGateway {
    pub fn new(store: Arc<dyn ObjectStore>, settings: GatewaySettings) -> Self {
        Self { store, settings }
    }
}

#[async_trait]
impl PersistenceGateway for OssGateway {
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        options: UploadOptions,
    ) -> Result<UploadResult, StorageError> {
        let started_at = Instant::now();
        let filename = ensure_png_suffix(filename);
        let path = options
            .path
            .as_deref()
            .unwrap_or(self.settings.default_path.as_str());
        let key = build_object_key(path, epoch_millis(), &filename);
        let timeout = options.timeout.unwrap_or(self.settings.timeout);
        let size = data.len() as u64;

        let put_options = PutOptions {
            timeout: Some(timeout),
            content_type: Some(PNG_CONTENT_TYPE.to_string()),
            metadata: options.metadata,
        };

        let outcome = match tokio::time::timeout(timeout, self.store.put(&key, data, put_options)).await {
            Ok(result) => result,
            Err(_) => Err(ObjectStoreError::Timeout),
        };

        let url = outcome
            .and_then(|()| self.store.signed_url(&key, self.settings.url_expiry))
            .map_err(|err| {
                warn!(
                    target = "application::storage",
                    op = "storage::upload",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    key = %key,
                    error = %err,
                    "Raster upload failed"
                );
                StorageError::Upload {
                    cause: err.to_string(),
                }
            })?;

        info!(
            target = "application::storage",
            op = "storage::upload",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            key = %key,
            size_bytes = size,
            "Raster uploaded"
        );

        Ok(UploadResult {
            url,
            filename,
            key,
            size,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.store.head(key).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(StorageError::Probe {
                cause: err.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.store.delete(key).await {
            Ok(()) => {
                info!(
                    target = "application::storage",
                    op = "storage::delete",
                    result = "ok",
                    key = %key,
                    "Object deleted"
                );
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => {
                warn!(
                    target = "application::storage",
                    op = "storage::delete",
                    result = "error",
                    key = %key,
                    error = %err,
                    "Object delete failed"
                );
                Err(StorageError::Delete {
                    cause: err.to_string(),
                })
            }
        }
    }
}

/// Append `.png` unless the name already carries it.
pub fn ensure_png_suffix(filename: &str) -> String {
    if filename.ends_with(PNG_SUFFIX) {
        filename.to_string()
    } else {
        format!("{filename}{PNG_SUFFIX}")
    }
}

/// `{path}/{millis}-{filename}`. Uniqueness relies on the millisecond clock.
pub fn build_object_key(path: &str, millis: i128, filename: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        format!("{millis}-{filename}")
    } else {
        format!("{path}/{millis}-{filename}")
    }
}

fn epoch_millis() -> i128 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::object_store::MemoryObjectStore;

    fn gateway(store: Arc<MemoryObjectStore>) -> OssGateway {
        OssGateway::new(store, GatewaySettings::default())
    }

    #[test]
    fn png_suffix_is_added_once() {
        assert_eq!(ensure_png_suffix("formula-image"), "formula-image.png");
        assert_eq!(ensure_png_suffix("formula-image.png"), "formula-image.png");
        assert_eq!(ensure_png_suffix("eq.svg"), "eq.svg.png");
    }

    #[test]
    fn object_key_layout() {
        assert_eq!(
            build_object_key("formula-images", 1_700_000_000_123, "a.png"),
            "formula-images/1700000000123-a.png"
        );
        assert_eq!(build_object_key("/nested/dir/", 5, "b.png"), "nested/dir/5-b.png");
        assert_eq!(build_object_key("", 5, "b.png"), "5-b.png");
    }

    #[tokio::test]
    async fn upload_stores_bytes_and_returns_signed_url() {
        let store = Arc::new(MemoryObjectStore::new("https://bucket.example.com"));
        let gateway = gateway(Arc::clone(&store));

        let mut metadata = BTreeMap::new();
        metadata.insert("dpi".to_string(), "144".to_string());
        let result = gateway
            .upload(
                Bytes::from_static(b"\x89PNG"),
                "eq",
                UploadOptions {
                    metadata,
                    ..Default::default()
                },
            )
            .await
            .expect("upload succeeds");

        assert_eq!(result.filename, "eq.png");
        assert_eq!(result.size, 4);
        let (prefix, name) = result.key.split_once('/').expect("key has a prefix");
        assert_eq!(prefix, DEFAULT_UPLOAD_PATH);
        let (millis, rest) = name.split_once('-').expect("timestamp separator");
        assert!(millis.parse::<u64>().is_ok());
        assert_eq!(rest, "eq.png");
        assert!(result.url.starts_with("https://bucket.example.com/"));
        assert!(result.url.contains("Expires="));

        let stored = store.object(&result.key).expect("object stored");
        assert_eq!(stored.content_type.as_deref(), Some("image/png"));
        assert_eq!(stored.metadata.get("dpi").map(String::as_str), Some("144"));
    }

    #[tokio::test]
    async fn upload_honours_custom_path() {
        let store = Arc::new(MemoryObjectStore::new("https://bucket.example.com"));
        let result = gateway(store)
            .upload(
                Bytes::from_static(b"png"),
                "eq.png",
                UploadOptions {
                    path: Some("custom".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.key.starts_with("custom/"));
        assert!(result.key.ends_with("-eq.png"));
        assert!(!result.key.ends_with(".png.png"));
    }

    #[tokio::test]
    async fn upload_failure_is_reported() {
        let store = Arc::new(MemoryObjectStore::new("https://bucket.example.com"));
        store.fail_with(ObjectStoreError::Status {
            status: 403,
            message: "AccessDenied".to_string(),
        });
        let err = gateway(store)
            .upload(Bytes::from_static(b"png"), "eq", UploadOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("upload failed: "));
        assert!(err.to_string().contains("AccessDenied"));
    }

    #[tokio::test]
    async fn exists_maps_not_found_to_false() {
        let store = Arc::new(MemoryObjectStore::new("https://bucket.example.com"));
        let gateway = gateway(Arc::clone(&store));
        let uploaded = gateway
            .upload(Bytes::from_static(b"png"), "eq", UploadOptions::default())
            .await
            .unwrap();

        assert!(gateway.exists(&uploaded.key).await.unwrap());
        assert!(!gateway.exists("formula-images/missing.png").await.unwrap());

        store.fail_with(ObjectStoreError::Transport("connection reset".to_string()));
        assert!(matches!(
            gateway.exists(&uploaded.key).await,
            Err(StorageError::Probe { .. })
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = Arc::new(MemoryObjectStore::new("https://bucket.example.com"));
        let gateway = gateway(Arc::clone(&store));
        let uploaded = gateway
            .upload(Bytes::from_static(b"png"), "eq", UploadOptions::default())
            .await
            .unwrap();

        gateway.delete(&uploaded.key).await.unwrap();
        gateway.delete(&uploaded.key).await.unwrap();
        assert!(!gateway.exists(&uploaded.key).await.unwrap());

        store.fail_with(ObjectStoreError::Status {
            status: 500,
            message: "InternalError".to_string(),
        });
        assert!(matches!(
            gateway.delete(&uploaded.key).await,
            Err(StorageError::Delete { .. })
        ));
    }
}
