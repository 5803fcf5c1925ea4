//! # subprep-engine
//!
//! Client-side orchestration for the subprep companion media server: download
//! session management with per-id deduplication and cancellation, progress
//! delivery over a push channel with a polling fallback, artifact
//! materialization with integrity checks, and segment preparation for
//! per-segment subtitle generation.
//!
//! The companion server itself (yt-dlp invocation, ffmpeg splitting) is a
//! black box consumed through [`server::MediaServer`].

pub mod config;
pub mod direct;
pub mod error;
pub mod materialize;
pub mod media;
pub mod progress;
pub mod segment;
pub mod server;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    ChannelConfig, EngineConfig, MaterializeConfig, SegmentConfig, ServerConfig, SessionConfig,
};
pub use direct::{DirectDownloader, DirectOptions};
pub use error::{EngineError, Result};
pub use materialize::Materializer;
pub use media::{ArtifactLocation, DownloadOutcome, MediaFile, VIDEO_MIME};
pub use progress::{ChannelCallback, ChannelEvent, ProgressChannel};
pub use segment::{
    DurationProbe, PreparedMedia, SegmentDescriptor, SegmentPreparer, SegmentState, segment_count,
};
pub use server::{HttpMediaServer, MediaServer};
pub use session::{
    DouyinAdapter, DownloadOptions, GenericAdapter, SessionManager, SessionStatus, SourceAdapter,
    StatusSnapshot, YouTubeAdapter,
};
pub use store::{KeyValueStore, MemoryStore, clear_media_state};
