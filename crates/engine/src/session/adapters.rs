//! Per-source download choreography.
//!
//! The session manager is generic over a [`SourceAdapter`] so YouTube, Douyin
//! and generic-site downloads share one state machine while routing to their
//! own endpoints. Platform downloads block on the server call and resolve
//! with the artifact URL; generic downloads are accepted immediately and
//! complete through the progress channel.

use async_trait::async_trait;
use source_resolver::{SourceKind, douyin, generic, youtube};
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::server::MediaServer;

/// Inputs for kicking off one server-side download.
#[derive(Debug, Clone, Copy)]
pub struct StartRequest<'a> {
    pub id: &'a str,
    pub url: &'a str,
    pub quality: &'a str,
    pub force_refresh: bool,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync + 'static {
    fn kind(&self) -> SourceKind;

    /// Derive the session id for a URL. `None` means the URL is not valid for
    /// this source.
    fn resolve(&self, url: &str) -> Option<String>;

    /// Look for an already-downloaded artifact on the server.
    async fn probe(&self, server: &dyn MediaServer, id: &str) -> Result<Option<String>>;

    /// Kick off the server-side download. `Some(path)` when the call itself
    /// completes the download; `None` when completion arrives through the
    /// progress channel.
    async fn start(&self, server: &dyn MediaServer, request: StartRequest<'_>)
    -> Result<Option<String>>;

    /// Best-effort server-side abort; failures are logged, never propagated.
    async fn cancel(&self, server: &dyn MediaServer, id: &str);

    /// Canonical artifact path for a completed download of `id`.
    fn artifact_path(&self, id: &str) -> String {
        format!("/videos/{id}.mp4")
    }
}

async fn probe_existing(server: &dyn MediaServer, id: &str, fallback: String) -> Result<Option<String>> {
    let reply = server.video_exists(id).await?;
    if reply.exists {
        Ok(Some(reply.url.unwrap_or(fallback)))
    } else {
        Ok(None)
    }
}

/// YouTube downloads through the platform endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct YouTubeAdapter;

#[async_trait]
impl SourceAdapter for YouTubeAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::YouTube
    }

    fn resolve(&self, url: &str) -> Option<String> {
        youtube::extract_video_id(url).map(str::to_string)
    }

    async fn probe(&self, server: &dyn MediaServer, id: &str) -> Result<Option<String>> {
        probe_existing(server, id, self.artifact_path(id)).await
    }

    async fn start(
        &self,
        server: &dyn MediaServer,
        request: StartRequest<'_>,
    ) -> Result<Option<String>> {
        let reply = server.download_video(request.id, request.quality).await?;
        Ok(Some(reply.url))
    }

    async fn cancel(&self, server: &dyn MediaServer, id: &str) {
        match server.cancel_download_only(id).await {
            Ok(reply) if !reply.success => {
                warn!(id, "server declined the cancel request");
            }
            Ok(_) => {}
            Err(e) => warn!(id, error = %e, "failed to notify server of cancellation"),
        }
    }
}

/// Douyin downloads: identical shape to YouTube against its own server.
#[derive(Debug, Default, Clone, Copy)]
pub struct DouyinAdapter;

#[async_trait]
impl SourceAdapter for DouyinAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Douyin
    }

    fn resolve(&self, url: &str) -> Option<String> {
        douyin::extract_video_id(url).map(str::to_string)
    }

    async fn probe(&self, server: &dyn MediaServer, id: &str) -> Result<Option<String>> {
        probe_existing(server, id, self.artifact_path(id)).await
    }

    async fn start(
        &self,
        server: &dyn MediaServer,
        request: StartRequest<'_>,
    ) -> Result<Option<String>> {
        let reply = server.download_video(request.id, request.quality).await?;
        Ok(Some(reply.url))
    }

    async fn cancel(&self, server: &dyn MediaServer, id: &str) {
        match server.cancel_download_only(id).await {
            Ok(reply) if !reply.success => {
                warn!(id, "server declined the cancel request");
            }
            Ok(_) => {}
            Err(e) => warn!(id, error = %e, "failed to notify server of cancellation"),
        }
    }
}

/// Arbitrary-site downloads through yt-dlp on the companion server.
///
/// Ids fold in a creation timestamp, so re-resolving the same URL yields a
/// new session unless the caller supplies a stable id.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericAdapter;

#[async_trait]
impl SourceAdapter for GenericAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Generic
    }

    fn resolve(&self, url: &str) -> Option<String> {
        generic::synthesize_id(url, chrono::Utc::now().timestamp_millis())
    }

    async fn probe(&self, server: &dyn MediaServer, id: &str) -> Result<Option<String>> {
        probe_existing(server, id, self.artifact_path(id)).await
    }

    async fn start(
        &self,
        server: &dyn MediaServer,
        request: StartRequest<'_>,
    ) -> Result<Option<String>> {
        let reply = server
            .download_generic(request.id, request.url, request.force_refresh)
            .await?;
        if !reply.success {
            return Err(EngineError::server_reported(
                "Video download",
                reply
                    .error
                    .unwrap_or_else(|| "server rejected the request".to_string()),
            ));
        }
        // Completion is observed through the progress channel.
        Ok(None)
    }

    async fn cancel(&self, server: &dyn MediaServer, id: &str) {
        // Fire-and-forget by contract.
        if let Err(e) = server.cancel_generic(id).await {
            warn!(id, error = %e, "failed to notify server of cancellation");
        }
    }
}
