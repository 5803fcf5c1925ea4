//! Companion-server HTTP client.
//!
//! The companion server performs the actual yt-dlp downloading and ffmpeg
//! splitting; this module only speaks its HTTP contract. [`MediaServer`] is
//! the seam everything else depends on, so tests can substitute fakes without
//! a network.

use async_trait::async_trait;
use bytes::Bytes;
use prep_common::{ProgressFn, ProgressUpdate};
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{EngineError, Result};
use crate::media::MediaFile;

/// `GET /api/video-exists/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExistsReply {
    pub exists: bool,
    #[serde(default)]
    pub url: Option<String>,
}

/// `POST /api/download-video` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadReply {
    pub url: String,
}

/// Generic accept/reject envelope used by several endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AcceptReply {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /api/download-only` request body.
#[derive(Debug, Clone, Serialize)]
pub struct DirectDownloadRequest {
    pub url: String,
    /// Media kind requested from the server ("video" or "audio").
    #[serde(rename = "type")]
    pub media_type: String,
    pub quality: String,
    /// Platform name driving the server-side extractor choice.
    pub source: String,
    #[serde(rename = "useCookies")]
    pub use_cookies: bool,
}

/// `POST /api/download-only` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectDownloadReply {
    pub success: bool,
    #[serde(rename = "videoId", default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/download-only-progress/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressReply {
    pub success: bool,
    #[serde(default)]
    pub progress: Option<u8>,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// One raw segment as reported by `POST /api/split-video`. Fields the server
/// omits are defaulted from the segment's ordinal position downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSegment {
    #[serde(rename = "startTime", default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `POST /api/split-video` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReply {
    pub segments: Vec<RawSegment>,
}

/// The companion server's consumed surface.
#[async_trait]
pub trait MediaServer: Send + Sync {
    async fn video_exists(&self, id: &str) -> Result<ExistsReply>;

    /// Blocking platform download (YouTube/Douyin): resolves with the artifact
    /// URL once the server has finished fetching.
    async fn download_video(&self, id: &str, quality: &str) -> Result<DownloadReply>;

    /// Fire-and-poll generic download: the server accepts and reports progress
    /// through the channel transports until a terminal status.
    async fn download_generic(&self, id: &str, url: &str, force_refresh: bool)
    -> Result<AcceptReply>;

    async fn cancel_generic(&self, id: &str) -> Result<()>;

    async fn download_only(&self, request: &DirectDownloadRequest) -> Result<DirectDownloadReply>;

    async fn download_only_progress(&self, id: &str) -> Result<ProgressReply>;

    async fn cancel_download_only(&self, id: &str) -> Result<AcceptReply>;

    /// Fetch raw artifact bytes. Implementations must defeat intermediate
    /// caches: the server may have finished writing the file moments ago.
    async fn fetch_file(&self, path: &str) -> Result<Bytes>;

    async fn split_video(
        &self,
        file: &MediaFile,
        max_segment_duration: f64,
        fast_mode: bool,
        on_progress: ProgressFn,
    ) -> Result<SplitReply>;
}

/// reqwest-backed [`MediaServer`] implementation.
pub struct HttpMediaServer {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMediaServer {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    /// Resolve a server path against the base URL; absolute URLs pass through.
    fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Derive the push-channel endpoint from the HTTP base URL.
    pub fn websocket_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{}", self.base_url)
        };
        format!("{ws_base}/ws")
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        operation: &'static str,
    ) -> Result<T> {
        let url = self.endpoint(path);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::http_status(response.status(), url, operation));
        }
        Ok(response.json().await?)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        operation: &'static str,
    ) -> Result<T> {
        let url = self.endpoint(path);
        let response = self.client.post(&url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::http_status(response.status(), url, operation));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MediaServer for HttpMediaServer {
    async fn video_exists(&self, id: &str) -> Result<ExistsReply> {
        self.get_json(&format!("/api/video-exists/{id}"), "existence check")
            .await
    }

    async fn download_video(&self, id: &str, quality: &str) -> Result<DownloadReply> {
        self.post_json(
            "/api/download-video",
            &json!({ "videoId": id, "quality": quality }),
            "video download",
        )
        .await
    }

    async fn download_generic(
        &self,
        id: &str,
        url: &str,
        force_refresh: bool,
    ) -> Result<AcceptReply> {
        self.post_json(
            "/api/download-generic-video",
            &json!({ "videoId": id, "url": url, "forceRefresh": force_refresh }),
            "generic download",
        )
        .await
    }

    async fn cancel_generic(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&format!("/api/cancel-generic-download/{id}"));
        // Fire-and-forget: the response body is not part of the contract.
        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::http_status(
                response.status(),
                url,
                "generic download cancel",
            ));
        }
        Ok(())
    }

    async fn download_only(&self, request: &DirectDownloadRequest) -> Result<DirectDownloadReply> {
        let url = self.endpoint("/api/download-only");
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::http_status(
                response.status(),
                url,
                "direct download",
            ));
        }
        Ok(response.json().await?)
    }

    async fn download_only_progress(&self, id: &str) -> Result<ProgressReply> {
        self.get_json(
            &format!("/api/download-only-progress/{id}"),
            "progress poll",
        )
        .await
    }

    async fn cancel_download_only(&self, id: &str) -> Result<AcceptReply> {
        self.post_json(
            &format!("/api/cancel-download-only/{id}"),
            &json!({}),
            "download cancel",
        )
        .await
    }

    async fn fetch_file(&self, path: &str) -> Result<Bytes> {
        let mut url = self.endpoint(path);
        // Cache-defeating timestamp: the server may have just finished writing
        // the file and intermediate caches must not serve a stale copy.
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str(&format!("t={}", chrono::Utc::now().timestamp_millis()));

        debug!(url, "fetching artifact bytes");
        let response = self
            .client
            .get(&url)
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EngineError::http_status(
                response.status(),
                url,
                "artifact fetch",
            ));
        }
        Ok(response.bytes().await?)
    }

    async fn split_video(
        &self,
        file: &MediaFile,
        max_segment_duration: f64,
        fast_mode: bool,
        on_progress: ProgressFn,
    ) -> Result<SplitReply> {
        on_progress(ProgressUpdate::with_phase(0, "Uploading video to server"));

        let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let form = reqwest::multipart::Form::new()
            .part("video", part)
            .text("segmentDuration", max_segment_duration.to_string())
            .text("fastMode", fast_mode.to_string());

        let url = self.endpoint("/api/split-video");
        let response = self.client.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::http_status(
                response.status(),
                url,
                "video split",
            ));
        }
        let reply: SplitReply = response.json().await?;

        on_progress(ProgressUpdate::with_phase(100, "Split complete"));
        Ok(reply)
    }
}
