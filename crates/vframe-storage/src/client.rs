//! Object storage clients.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Binary storage contract consumed by the frame store adapter.
///
/// `put` is overwriting: writing the same key twice leaves one object, which
/// is what makes frame persistence safe to retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object, replacing any existing object at `key`.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Configuration for the S3-compatible client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" works for R2-style providers)
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("FRAME_S3_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("FRAME_S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("FRAME_S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("FRAME_S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("FRAME_S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("FRAME_S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("FRAME_S3_BUCKET")
                .map_err(|_| StorageError::config_error("FRAME_S3_BUCKET not set"))?,
            region: std::env::var("FRAME_S3_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// S3-compatible object store (AWS S3, Cloudflare R2, MinIO).
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new client from configuration.
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vframe",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", bytes.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }
}

/// In-memory object store for tests and embedded single-node use.
///
/// Supports injecting per-key put failures so retry behavior can be
/// exercised without a network.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    put_failures: Arc<Mutex<HashMap<String, u32>>>,
    put_calls: Arc<Mutex<HashMap<String, u32>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` puts for `key` fail.
    pub async fn fail_next_puts(&self, key: &str, count: u32) {
        self.put_failures.lock().await.insert(key.to_string(), count);
    }

    /// Number of objects currently stored.
    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }

    /// Number of put calls observed for `key`.
    pub async fn put_calls(&self, key: &str) -> u32 {
        self.put_calls.lock().await.get(key).copied().unwrap_or(0)
    }

    /// Fetch a stored object's bytes.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(key).map(|(b, _)| b.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        *self
            .put_calls
            .lock()
            .await
            .entry(key.to_string())
            .or_insert(0) += 1;

        let mut failures = self.put_failures.lock().await;
        if let Some(remaining) = failures.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::AwsSdk(format!(
                    "injected put failure for {key}"
                )));
            }
        }
        drop(failures);

        self.objects
            .lock()
            .await
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().await.contains_key(key))
    }
}
