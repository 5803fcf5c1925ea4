//! Configurable options for the download/segmentation engine.

use std::time::Duration;

use prep_common::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Minimum plausible size for a full video artifact. Anything smaller is
/// treated as a corrupt or partial download, never as a valid empty result.
pub const MIN_VIDEO_BYTES: usize = 100 * 1024;

/// Connection settings for one companion-server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://127.0.0.1:3007`.
    pub base_url: String,

    /// Connection timeout (time to establish the initial connection).
    pub connect_timeout: Duration,

    /// Overall per-request timeout. `None` disables it; artifact fetches for
    /// large videos routinely exceed any reasonable fixed bound.
    pub request_timeout: Option<Duration>,

    /// User agent string.
    pub user_agent: String,
}

impl ServerConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3004".to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// Settings for the progress channel adapter.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Whether to attempt the websocket push transport at all. When false
    /// every subscription uses interval polling.
    pub enable_push: bool,

    /// Websocket endpoint for the push transport. `None` behaves like a
    /// failed connection attempt: subscriptions fall back to polling.
    pub ws_url: Option<String>,

    /// Fixed polling interval for the fallback transport.
    pub poll_interval: Duration,

    /// Optional ceiling on how long the polling fallback keeps asking before
    /// giving up. `None` polls until a terminal status is observed, trusting
    /// the server to eventually finish.
    pub poll_giveup: Option<Duration>,

    /// Backoff policy for reconnecting a dropped push channel.
    pub reconnect: RetryPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enable_push: true,
            ws_url: None,
            poll_interval: Duration::from_secs(1),
            poll_giveup: None,
            reconnect: RetryPolicy {
                max_retries: 10,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(60),
                jitter: false,
            },
        }
    }
}

/// Settings for the download session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed step added to displayed progress by the simulation timer.
    pub simulate_step: u8,

    /// Interval between simulation ticks.
    pub simulate_tick: Duration,

    /// Displayed progress never climbs past this value on simulation alone;
    /// only real transport updates (and completion) go higher.
    pub simulate_ceiling: u8,

    /// Quality requested from the companion server when the caller does not
    /// specify one.
    pub default_quality: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulate_step: 2,
            simulate_tick: Duration::from_millis(800),
            simulate_ceiling: 95,
            default_quality: "720p".to_string(),
        }
    }
}

/// Settings for artifact materialization.
#[derive(Debug, Clone)]
pub struct MaterializeConfig {
    /// Fetched blobs below this size are treated as corrupt and retried.
    pub min_video_bytes: usize,
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            min_video_bytes: MIN_VIDEO_BYTES,
        }
    }
}

/// Settings for segment preparation.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Maximum duration of one segment, in seconds.
    pub max_segment_duration: f64,

    /// Files below this size are rejected before probing.
    pub min_video_bytes: usize,

    /// Ask the server for stream-copy splitting instead of re-encoding.
    pub fast_mode: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_segment_duration: 600.0,
            min_video_bytes: MIN_VIDEO_BYTES,
            fast_mode: true,
        }
    }
}

/// Aggregate configuration covering all engine components.
///
/// The per-source base URLs default to the companion server's conventional
/// ports: YouTube on 3004, Douyin on 3007, generic downloads on 3031.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub youtube: ServerConfig,
    pub douyin: ServerConfig,
    pub generic: ServerConfig,
    pub channel: ChannelConfig,
    pub session: SessionConfig,
    pub materialize: MaterializeConfig,
    pub segment: SegmentConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            youtube: ServerConfig::with_base_url("http://127.0.0.1:3004"),
            douyin: ServerConfig::with_base_url("http://127.0.0.1:3007"),
            generic: ServerConfig::with_base_url("http://127.0.0.1:3031"),
            channel: ChannelConfig::default(),
            session: SessionConfig::default(),
            materialize: MaterializeConfig::default(),
            segment: SegmentConfig::default(),
        }
    }
}
