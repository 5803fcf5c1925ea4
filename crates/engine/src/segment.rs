//! Segment preparation.
//!
//! Takes a materialized file, probes its duration, asks the companion server
//! to split it into bounded-duration segments, and normalizes the reply into
//! [`SegmentDescriptor`]s ready for per-segment subtitle generation and
//! retry. The raw split reply is persisted so a reloaded UI can resume.

use std::sync::Arc;

use async_trait::async_trait;
use prep_common::ProgressFn;
use prep_common::clock::format_time_range;
use tracing::{info, warn};

use crate::config::SegmentConfig;
use crate::error::{EngineError, Result};
use crate::media::{MediaFile, VIDEO_MIME};
use crate::server::{MediaServer, RawSegment};
use crate::store::{KeyValueStore, keys};

/// Duration-probing collaborator (ffprobe, a media framework, a fake).
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, file: &MediaFile) -> Result<f64>;
}

/// Processing state of one segment, driving the per-segment retry surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentState {
    Ready,
    Processing,
    Succeeded { url: String },
    Failed { reason: String },
}

impl SegmentState {
    /// Full status line shown next to the segment.
    pub fn message(&self) -> String {
        match self {
            SegmentState::Ready => "Ready for processing".to_string(),
            SegmentState::Processing => "Processing...".to_string(),
            SegmentState::Succeeded { .. } => "Done".to_string(),
            SegmentState::Failed { reason } => reason.clone(),
        }
    }

    /// Compact badge text.
    pub fn short_message(&self) -> &'static str {
        match self {
            SegmentState::Ready => "Ready",
            SegmentState::Processing => "Working",
            SegmentState::Succeeded { .. } => "Done",
            SegmentState::Failed { .. } => "Failed",
        }
    }
}

/// One bounded-duration slice of a prepared video.
#[derive(Debug, Clone)]
pub struct SegmentDescriptor {
    pub index: usize,
    pub start_time: f64,
    pub duration: f64,
    pub state: SegmentState,
    /// Display range, e.g. `0:00 - 10:00`.
    pub time_range: String,
}

impl SegmentDescriptor {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// A file plus its normalized segment list.
#[derive(Debug, Clone)]
pub struct PreparedMedia {
    pub file: MediaFile,
    pub duration: f64,
    pub segments: Vec<SegmentDescriptor>,
}

/// Number of segments for a source duration and a per-segment maximum.
pub fn segment_count(duration: f64, max_segment_duration: f64) -> usize {
    if duration <= 0.0 || max_segment_duration <= 0.0 {
        return 0;
    }
    (duration / max_segment_duration).ceil() as usize
}

pub struct SegmentPreparer<P, K> {
    server: Arc<dyn MediaServer>,
    probe: P,
    store: K,
    config: SegmentConfig,
}

impl<P: DurationProbe, K: KeyValueStore> SegmentPreparer<P, K> {
    pub fn new(server: Arc<dyn MediaServer>, probe: P, store: K, config: SegmentConfig) -> Self {
        Self {
            server,
            probe,
            store,
            config,
        }
    }

    /// Split `file` into segments, forwarding split progress to `on_progress`.
    ///
    /// Rejects undersized files before any processing; normalizes missing
    /// file metadata; initializes every produced segment to
    /// [`SegmentState::Ready`].
    pub async fn prepare(&self, file: MediaFile, on_progress: ProgressFn) -> Result<PreparedMedia> {
        if file.size() < self.config.min_video_bytes {
            return Err(EngineError::InvalidMedia {
                reason: format!(
                    "file is {} bytes; likely not a valid video",
                    file.size()
                ),
            });
        }
        let file = normalize(file);

        let duration = self.probe.duration(&file).await?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(EngineError::Probe {
                reason: format!("implausible duration {duration}"),
            });
        }

        let count = segment_count(duration, self.config.max_segment_duration);
        info!(
            duration,
            count,
            max_segment = self.config.max_segment_duration,
            "splitting video"
        );

        let reply = self
            .server
            .split_video(
                &file,
                self.config.max_segment_duration,
                self.config.fast_mode,
                on_progress,
            )
            .await?;

        // Persist the raw reply so a reloaded session can pick up where it
        // left off without re-splitting.
        match serde_json::to_string(&reply.segments) {
            Ok(raw) => {
                if let Err(e) = self.store.put(keys::LAST_SPLIT_RESULT, raw).await {
                    warn!(error = %e, "failed to persist split result");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode split result"),
        }

        let raw_segments = if reply.segments.is_empty() {
            // Some server builds omit the list; synthesize it from the count.
            (0..count).map(|_| RawSegment {
                start_time: None,
                duration: None,
                url: None,
                name: None,
            }).collect()
        } else {
            reply.segments
        };

        let segments =
            build_descriptors(&raw_segments, duration, self.config.max_segment_duration);
        Ok(PreparedMedia {
            file,
            duration,
            segments,
        })
    }
}

/// Fill in name/MIME for files that arrived without them.
fn normalize(mut file: MediaFile) -> MediaFile {
    if file.name.trim().is_empty() {
        file.name = MediaFile::synthesized_name(chrono::Utc::now().timestamp_millis());
    }
    if file.mime.trim().is_empty() {
        file.mime = VIDEO_MIME.to_string();
    }
    file
}

/// Normalize raw server segments into contiguous descriptors.
///
/// Missing `start_time`/`duration` fields default from the segment's ordinal
/// position and the configured maximum; the final segment absorbs the
/// remainder so durations sum to the source duration.
fn build_descriptors(
    raw: &[RawSegment],
    duration: f64,
    max_segment_duration: f64,
) -> Vec<SegmentDescriptor> {
    raw.iter()
        .enumerate()
        .map(|(index, segment)| {
            let start = segment
                .start_time
                .unwrap_or(index as f64 * max_segment_duration)
                .max(0.0);
            let seg_duration = segment
                .duration
                .unwrap_or_else(|| (duration - start).min(max_segment_duration))
                .max(0.0);
            let end = start + seg_duration;
            SegmentDescriptor {
                index,
                start_time: start,
                duration: seg_duration,
                state: SegmentState::Ready,
                time_range: format_time_range(start, end),
            }
        })
        .collect()
}
