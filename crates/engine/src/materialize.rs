//! Artifact materialization.
//!
//! Turns a completed download's location into an in-memory [`MediaFile`].
//! Server-side artifacts are fetched with cache-defeating parameters (the
//! transport layer adds them to every request); blobs under the minimum size
//! threshold are treated as corrupt and refetched once through the canonical
//! path before the failure is terminal.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::MaterializeConfig;
use crate::error::{EngineError, Result};
use crate::media::{ArtifactLocation, DownloadOutcome, MediaFile, VIDEO_MIME};
use crate::server::MediaServer;

pub struct Materializer {
    server: Arc<dyn MediaServer>,
    config: MaterializeConfig,
}

impl Materializer {
    pub fn new(server: Arc<dyn MediaServer>, config: MaterializeConfig) -> Self {
        Self { server, config }
    }

    /// Materialize a session outcome into a named, typed in-memory file.
    pub async fn materialize(&self, outcome: &DownloadOutcome) -> Result<MediaFile> {
        match &outcome.location {
            ArtifactLocation::InMemory(file) => {
                // Bytes from an earlier fetch are reused directly; refetching
                // through a stale reference is unreliable.
                debug!(id = %outcome.id, size = file.size(), "reusing in-memory artifact");
                Ok(file.clone())
            }
            ArtifactLocation::ServerPath(path) => {
                let canonical = format!("/videos/{}.mp4", outcome.id);
                let bytes = self.fetch_checked(path, &canonical).await?;
                Ok(MediaFile::new(
                    format!("{}.mp4", outcome.id),
                    VIDEO_MIME,
                    bytes,
                ))
            }
        }
    }

    /// Materialize a direct ("download only") artifact by server id.
    pub async fn materialize_direct(&self, id: &str) -> Result<MediaFile> {
        let path = format!("/api/download-only-file/{id}");
        let bytes = self.fetch_checked(&path, &path).await?;
        Ok(MediaFile::new(format!("{id}.mp4"), VIDEO_MIME, bytes))
    }

    /// Fetch with the size-threshold integrity check, retrying once through
    /// the canonical path. An undersized blob is a corrupt download, not a
    /// valid empty result.
    async fn fetch_checked(&self, path: &str, canonical: &str) -> Result<Bytes> {
        match self.server.fetch_file(path).await {
            Ok(bytes) if bytes.len() >= self.config.min_video_bytes => Ok(bytes),
            Ok(bytes) => {
                warn!(
                    path,
                    size = bytes.len(),
                    min = self.config.min_video_bytes,
                    "artifact below size threshold; refetching via canonical path"
                );
                self.refetch(canonical).await
            }
            Err(e) => {
                warn!(path, error = %e, "artifact fetch failed; refetching via canonical path");
                self.refetch(canonical).await
            }
        }
    }

    async fn refetch(&self, canonical: &str) -> Result<Bytes> {
        let bytes = self.server.fetch_file(canonical).await?;
        if bytes.len() < self.config.min_video_bytes {
            return Err(EngineError::TooSmall {
                size: bytes.len(),
                min: self.config.min_video_bytes,
            });
        }
        Ok(bytes)
    }
}
