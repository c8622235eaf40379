//! Source video acquisition.
//!
//! Resolves a job's opaque `source_ref` into a local readable video file.
//! The pipeline does not care how the bytes were obtained; upload-backed
//! refs are plain paths, remote refs are URLs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

/// Resolves a `source_ref` into a local video file under `work_dir`.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Fetch the source, returning the path of a readable local copy.
    /// Failures surface as `SourceUnavailable`.
    async fn fetch(&self, source_ref: &str, work_dir: &Path) -> WorkerResult<PathBuf>;
}

/// Source reader for refs that are already local paths (direct uploads
/// staged by the submission layer).
#[derive(Debug, Default)]
pub struct LocalFileSource;

impl LocalFileSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceReader for LocalFileSource {
    async fn fetch(&self, source_ref: &str, _work_dir: &Path) -> WorkerResult<PathBuf> {
        let path = PathBuf::from(source_ref);
        if !path.is_file() {
            return Err(WorkerError::source_unavailable(format!(
                "no such file: {source_ref}"
            )));
        }
        debug!("Using local source {}", path.display());
        Ok(path)
    }
}

/// Source reader that downloads remote URLs into the work directory.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SourceReader for HttpSource {
    async fn fetch(&self, source_ref: &str, work_dir: &Path) -> WorkerResult<PathBuf> {
        let response = self
            .client
            .get(source_ref)
            .send()
            .await
            .map_err(|e| WorkerError::source_unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WorkerError::source_unavailable(format!(
                "{} returned HTTP {}",
                source_ref,
                response.status()
            )));
        }

        tokio::fs::create_dir_all(work_dir).await?;
        let dest = work_dir.join("source.mp4");
        let mut file = tokio::fs::File::create(&dest).await?;

        let mut response = response;
        let mut total = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| WorkerError::source_unavailable(e.to_string()))?
        {
            total += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!("Downloaded {} bytes from {}", total, source_ref);
        Ok(dest)
    }
}

/// Route a ref to the right reader: URLs download, everything else is a
/// local path.
#[derive(Debug, Default)]
pub struct AutoSource {
    http: HttpSource,
    local: LocalFileSource,
}

impl AutoSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SourceReader for AutoSource {
    async fn fetch(&self, source_ref: &str, work_dir: &Path) -> WorkerResult<PathBuf> {
        if source_ref.starts_with("http://") || source_ref.starts_with("https://") {
            self.http.fetch(source_ref, work_dir).await
        } else {
            self.local.fetch(source_ref, work_dir).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_source_missing_file() {
        let source = LocalFileSource::new();
        let dir = tempfile::tempdir().unwrap();
        let err = source
            .fetch("/nonexistent/video.mp4", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_local_source_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video.mp4");
        tokio::fs::write(&video, b"not really a video").await.unwrap();

        let source = LocalFileSource::new();
        let path = source
            .fetch(video.to_str().unwrap(), dir.path())
            .await
            .unwrap();
        assert_eq!(path, video);
    }
}
