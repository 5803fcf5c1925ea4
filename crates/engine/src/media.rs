//! In-memory media file objects and download artifact locations.

use bytes::Bytes;

pub const VIDEO_MIME: &str = "video/mp4";

/// An in-memory binary file with a name and MIME type, the unit handed from
/// the download side to segment preparation.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Synthesize a timestamped name for files that arrived without one.
    pub fn synthesized_name(timestamp_millis: i64) -> String {
        format!("video-{timestamp_millis}.mp4")
    }
}

/// Where a completed download's bytes live.
///
/// Previously-fetched in-memory bytes are carried directly instead of a
/// browser-style blob reference: re-fetching through such a reference from a
/// different context is unreliable, so the bytes themselves travel with the
/// outcome.
#[derive(Debug, Clone)]
pub enum ArtifactLocation {
    /// A path (or absolute URL) served by the companion server.
    ServerPath(String),
    /// Bytes already held in memory from a prior fetch.
    InMemory(MediaFile),
}

/// The result of a completed download session.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub id: String,
    pub location: ArtifactLocation,
}

impl DownloadOutcome {
    /// The server path for this outcome, if it is not an in-memory artifact.
    pub fn server_path(&self) -> Option<&str> {
        match &self.location {
            ArtifactLocation::ServerPath(path) => Some(path),
            ArtifactLocation::InMemory(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_names_embed_the_timestamp() {
        assert_eq!(MediaFile::synthesized_name(1700000000000), "video-1700000000000.mp4");
    }

    #[test]
    fn size_reports_byte_length() {
        let file = MediaFile::new("a.mp4", VIDEO_MIME, Bytes::from_static(b"abc"));
        assert_eq!(file.size(), 3);
    }
}
