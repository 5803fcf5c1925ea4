use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "subprep",
    version,
    about = "Download and segment videos through the subprep companion server"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download a video (YouTube, Douyin, or any yt-dlp-capable site) and
    /// prepare its subtitle segments
    Download {
        /// Source URL
        url: String,

        /// Companion server base URL (defaults to the source's standard port)
        #[arg(long)]
        server: Option<String>,

        /// Requested quality
        #[arg(long, default_value = "720p")]
        quality: String,

        /// Discard any cached artifact and download again
        #[arg(long)]
        force_refresh: bool,

        /// Reuse this session id instead of deriving one from the URL
        #[arg(long)]
        stable_id: Option<String>,

        /// Disable the websocket push channel (poll for progress instead)
        #[arg(long)]
        no_push: bool,

        /// Maximum segment duration in seconds
        #[arg(long, default_value_t = 600.0)]
        max_segment_duration: f64,

        /// Download only; skip duration probing and splitting
        #[arg(long)]
        skip_segments: bool,

        /// Write the downloaded file here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Fetch a file through the server's download-only endpoint
    Direct {
        /// Source URL
        url: String,

        /// Companion server base URL
        #[arg(long)]
        server: Option<String>,

        /// Requested quality
        #[arg(long, default_value = "720p")]
        quality: String,

        /// Media kind to request ("video" or "audio")
        #[arg(long, default_value = "video")]
        media_type: String,

        /// Forward site cookies to the server-side downloader
        #[arg(long)]
        use_cookies: bool,

        /// Disable the websocket push channel
        #[arg(long)]
        no_push: bool,

        /// Write the downloaded file here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show how a URL would be classified, without downloading
    Classify {
        /// URL to classify
        url: String,
    },
}
