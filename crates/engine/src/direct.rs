//! Direct ("download only") flow.
//!
//! Fetches a video file through the companion server without feeding the
//! subtitle pipeline: start the server-side job, observe progress through the
//! shared channel adapter, then materialize the finished file from the
//! download-only endpoint.

use std::sync::Arc;

use parking_lot::Mutex;
use prep_common::{CancellationToken, ProgressFn, ProgressUpdate};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::materialize::Materializer;
use crate::media::MediaFile;
use crate::progress::{ChannelCallback, ChannelEvent, ProgressChannel};
use crate::server::{DirectDownloadRequest, MediaServer};

/// Options for a direct download.
#[derive(Debug, Clone)]
pub struct DirectOptions {
    /// "video" or "audio".
    pub media_type: String,
    pub quality: String,
    /// Platform name driving the server-side extractor ("youtube", "generic").
    pub source: String,
    /// Forward site cookies to yt-dlp for logged-in content.
    pub use_cookies: bool,
}

impl Default for DirectOptions {
    fn default() -> Self {
        Self {
            media_type: "video".to_string(),
            quality: "720p".to_string(),
            source: "generic".to_string(),
            use_cookies: false,
        }
    }
}

pub struct DirectDownloader {
    server: Arc<dyn MediaServer>,
    channel: Arc<ProgressChannel>,
    materializer: Materializer,
}

impl DirectDownloader {
    pub fn new(
        server: Arc<dyn MediaServer>,
        channel: Arc<ProgressChannel>,
        materializer: Materializer,
    ) -> Self {
        Self {
            server,
            channel,
            materializer,
        }
    }

    /// Run a direct download to completion and return the fetched file.
    pub async fn download(
        &self,
        url: &str,
        options: &DirectOptions,
        on_progress: Option<ProgressFn>,
        token: &CancellationToken,
    ) -> Result<MediaFile> {
        let request = DirectDownloadRequest {
            url: url.to_string(),
            media_type: options.media_type.clone(),
            quality: options.quality.clone(),
            source: options.source.clone(),
            use_cookies: options.use_cookies,
        };
        let reply = self.server.download_only(&request).await?;
        if !reply.success {
            return Err(EngineError::server_reported(
                "Download",
                reply
                    .error
                    .unwrap_or_else(|| "server rejected the request".to_string()),
            ));
        }
        let id = reply
            .video_id
            .ok_or_else(|| EngineError::internal("download accepted without a video id"))?;
        info!(id, url, "direct download started");

        let (terminal_tx, terminal_rx) = oneshot::channel::<Result<(), String>>();
        let terminal = Arc::new(Mutex::new(Some(terminal_tx)));
        let progress = on_progress.clone();
        let callback: ChannelCallback = Arc::new(move |event| match event {
            ChannelEvent::Progress { percent, phase } => {
                if let Some(callback) = &progress {
                    callback(ProgressUpdate { percent, phase });
                }
            }
            ChannelEvent::Completed { .. } => {
                if let Some(tx) = terminal.lock().take() {
                    let _ = tx.send(Ok(()));
                }
            }
            ChannelEvent::Failed { error } => {
                if let Some(tx) = terminal.lock().take() {
                    let _ = tx.send(Err(error));
                }
            }
        });
        self.channel.subscribe(&id, callback).await;

        let result = tokio::select! {
            _ = token.cancelled() => {
                if let Err(e) = self.server.cancel_download_only(&id).await {
                    warn!(id, error = %e, "failed to notify server of cancellation");
                }
                Err(EngineError::Cancelled)
            }
            terminal = terminal_rx => match terminal {
                Ok(Ok(())) => Ok(()),
                Ok(Err(message)) => Err(EngineError::server_reported("Download", message)),
                Err(_) => Err(EngineError::channel(
                    "progress channel closed before a terminal status",
                )),
            },
        };
        self.channel.unsubscribe(&id).await;
        result?;

        if let Some(callback) = &on_progress {
            callback(ProgressUpdate::percent(100));
        }
        self.materializer.materialize_direct(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, MaterializeConfig};
    use crate::server::{DirectDownloadReply, ProgressReply};
    use crate::test_support::FakeServer;
    use bytes::Bytes;
    use std::sync::atomic::Ordering;

    fn downloader(server: Arc<FakeServer>) -> DirectDownloader {
        let channel_config = ChannelConfig {
            enable_push: false,
            ws_url: None,
            ..ChannelConfig::default()
        };
        let channel = Arc::new(ProgressChannel::new(server.clone(), channel_config));
        let materializer = Materializer::new(server.clone(), MaterializeConfig::default());
        DirectDownloader::new(server, channel, materializer)
    }

    #[tokio::test(start_paused = true)]
    async fn downloads_and_materializes_the_file() {
        let server = Arc::new(FakeServer::new());
        server.set_direct_reply(DirectDownloadReply {
            success: true,
            video_id: Some("dl-1".into()),
            filename: Some("clip.mp4".into()),
            error: None,
        });
        server.push_progress(ProgressReply {
            success: true,
            progress: Some(50),
            status: "downloading".into(),
            error: None,
        });
        server.push_progress(ProgressReply {
            success: true,
            progress: Some(100),
            status: "completed".into(),
            error: None,
        });
        server.push_file(Bytes::from(vec![9u8; 300 * 1024]));

        let downloader = downloader(server.clone());
        let token = CancellationToken::new();
        let file = downloader
            .download("https://example.com/clip", &DirectOptions::default(), None, &token)
            .await
            .unwrap();

        assert_eq!(file.name, "dl-1.mp4");
        assert_eq!(file.size(), 300 * 1024);
        assert_eq!(server.direct_calls.load(Ordering::Relaxed), 1);
        let paths = server.fetch_paths.lock().clone();
        assert_eq!(paths, vec!["/api/download-only-file/dl-1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_status_is_surfaced() {
        let server = Arc::new(FakeServer::new());
        server.set_direct_reply(DirectDownloadReply {
            success: true,
            video_id: Some("dl-2".into()),
            filename: None,
            error: None,
        });
        server.push_progress(ProgressReply {
            success: true,
            progress: None,
            status: "error".into(),
            error: Some("format unavailable".into()),
        });

        let downloader = downloader(server);
        let token = CancellationToken::new();
        let result = downloader
            .download("https://example.com/clip", &DirectOptions::default(), None, &token)
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("format unavailable"));
    }

    #[tokio::test]
    async fn rejection_reply_fails_fast() {
        let server = Arc::new(FakeServer::new());
        server.set_direct_reply(DirectDownloadReply {
            success: false,
            video_id: None,
            filename: None,
            error: Some("unsupported site".into()),
        });

        let downloader = downloader(server.clone());
        let token = CancellationToken::new();
        let result = downloader
            .download("https://example.com/clip", &DirectOptions::default(), None, &token)
            .await;

        assert!(result.unwrap_err().to_string().contains("unsupported site"));
        assert_eq!(server.progress_calls.load(Ordering::Relaxed), 0);
    }
}
