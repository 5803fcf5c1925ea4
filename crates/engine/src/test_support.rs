//! Scriptable fakes shared by the engine's unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use prep_common::{ProgressFn, ProgressUpdate};

use crate::error::{EngineError, Result};
use crate::media::MediaFile;
use crate::segment::DurationProbe;
use crate::server::{
    AcceptReply, DirectDownloadReply, DirectDownloadRequest, DownloadReply, ExistsReply,
    MediaServer, ProgressReply, SplitReply,
};

/// In-memory [`MediaServer`] with scriptable replies and call counters.
///
/// Scripted queues pop front-to-back; once a queue runs dry the fake falls
/// back to a benign default (video absent, status "downloading", and so on).
#[derive(Default)]
pub(crate) struct FakeServer {
    pub exists: Mutex<VecDeque<ExistsReply>>,
    pub exists_calls: AtomicUsize,

    pub download_urls: Mutex<VecDeque<String>>,
    pub download_calls: AtomicUsize,
    /// When set, `download_video` never resolves (for cancellation tests).
    pub hang_downloads: AtomicBool,

    pub generic_accept: Mutex<Option<AcceptReply>>,
    pub generic_calls: AtomicUsize,

    pub cancel_calls: AtomicUsize,
    pub cancel_generic_calls: AtomicUsize,

    pub progress: Mutex<VecDeque<ProgressReply>>,
    pub progress_calls: AtomicUsize,

    pub direct_reply: Mutex<Option<DirectDownloadReply>>,
    pub direct_calls: AtomicUsize,

    pub files: Mutex<VecDeque<Bytes>>,
    pub fetch_paths: Mutex<Vec<String>>,

    pub split_reply: Mutex<Option<SplitReply>>,
    pub split_calls: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_exists(&self, reply: ExistsReply) {
        self.exists.lock().push_back(reply);
    }

    pub fn push_progress(&self, reply: ProgressReply) {
        self.progress.lock().push_back(reply);
    }

    pub fn push_file(&self, bytes: Bytes) {
        self.files.lock().push_back(bytes);
    }

    pub fn set_generic_accept(&self, reply: AcceptReply) {
        *self.generic_accept.lock() = Some(reply);
    }

    pub fn set_direct_reply(&self, reply: DirectDownloadReply) {
        *self.direct_reply.lock() = Some(reply);
    }

    pub fn set_split(&self, reply: SplitReply) {
        *self.split_reply.lock() = Some(reply);
    }
}

#[async_trait]
impl MediaServer for FakeServer {
    async fn video_exists(&self, _id: &str) -> Result<ExistsReply> {
        self.exists_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.exists.lock().pop_front().unwrap_or(ExistsReply {
            exists: false,
            url: None,
        }))
    }

    async fn download_video(&self, id: &str, _quality: &str) -> Result<DownloadReply> {
        self.download_calls.fetch_add(1, Ordering::Relaxed);
        if self.hang_downloads.load(Ordering::Relaxed) {
            futures::future::pending::<()>().await;
        }
        let url = self
            .download_urls
            .lock()
            .pop_front()
            .unwrap_or_else(|| format!("/videos/{id}.mp4"));
        Ok(DownloadReply { url })
    }

    async fn download_generic(
        &self,
        _id: &str,
        _url: &str,
        _force_refresh: bool,
    ) -> Result<AcceptReply> {
        self.generic_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.generic_accept.lock().clone().unwrap_or(AcceptReply {
            success: true,
            error: None,
        }))
    }

    async fn cancel_generic(&self, _id: &str) -> Result<()> {
        self.cancel_generic_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn download_only(&self, _request: &DirectDownloadRequest) -> Result<DirectDownloadReply> {
        self.direct_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .direct_reply
            .lock()
            .clone()
            .unwrap_or(DirectDownloadReply {
                success: true,
                video_id: Some("direct".to_string()),
                filename: None,
                error: None,
            }))
    }

    async fn download_only_progress(&self, _id: &str) -> Result<ProgressReply> {
        self.progress_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.progress.lock().pop_front().unwrap_or(ProgressReply {
            success: true,
            progress: None,
            status: "downloading".to_string(),
            error: None,
        }))
    }

    async fn cancel_download_only(&self, _id: &str) -> Result<AcceptReply> {
        self.cancel_calls.fetch_add(1, Ordering::Relaxed);
        Ok(AcceptReply {
            success: true,
            error: None,
        })
    }

    async fn fetch_file(&self, path: &str) -> Result<Bytes> {
        self.fetch_paths.lock().push(path.to_string());
        self.files
            .lock()
            .pop_front()
            .ok_or_else(|| EngineError::internal("no scripted file"))
    }

    async fn split_video(
        &self,
        _file: &MediaFile,
        _max_segment_duration: f64,
        _fast_mode: bool,
        on_progress: ProgressFn,
    ) -> Result<SplitReply> {
        self.split_calls.fetch_add(1, Ordering::Relaxed);
        on_progress(ProgressUpdate::with_phase(25, "Uploading video"));
        on_progress(ProgressUpdate::with_phase(60, "Splitting video"));
        on_progress(ProgressUpdate::with_phase(100, "Split complete"));
        Ok(self
            .split_reply
            .lock()
            .clone()
            .unwrap_or(SplitReply { segments: vec![] }))
    }
}

/// Fixed-duration [`DurationProbe`].
pub(crate) struct FakeProbe {
    duration: f64,
}

impl FakeProbe {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl DurationProbe for FakeProbe {
    async fn duration(&self, _file: &MediaFile) -> Result<f64> {
        Ok(self.duration)
    }
}
