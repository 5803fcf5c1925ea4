//! # Source Resolver
//!
//! Classifies a user-supplied URL as one of the supported download sources
//! (YouTube, Douyin, or a generic yt-dlp-capable site) and derives the stable
//! identifier used to key a download session.
//!
//! Classification is a pure function over the URL string; generic-site ids
//! additionally fold in a caller-provided nonce (a creation timestamp in
//! production) so repeated downloads of the same page get distinct sessions
//! unless the caller supplies a stable id of its own.

pub mod douyin;
pub mod generic;
pub mod youtube;

use serde::{Deserialize, Serialize};

/// The download source a URL was matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    YouTube,
    Douyin,
    Generic,
}

impl SourceKind {
    /// Wire name used by the companion server (`source` request field).
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::YouTube => "youtube",
            SourceKind::Douyin => "douyin",
            SourceKind::Generic => "generic",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified URL: which source handles it, and the derived session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub kind: SourceKind,
    pub id: String,
}

/// Classify a URL, stamping generic-site ids with the current time.
///
/// Returns `None` when the string matches no known source shape; callers must
/// treat that as invalid input rather than an error.
pub fn classify(url: &str) -> Option<ResolvedSource> {
    classify_with_nonce(url, chrono::Utc::now().timestamp_millis())
}

/// Classify a URL with an explicit nonce for generic-site id synthesis.
///
/// Platform sources ignore the nonce; it only disambiguates generic ids.
pub fn classify_with_nonce(url: &str, nonce: i64) -> Option<ResolvedSource> {
    if let Some(id) = youtube::extract_video_id(url) {
        return Some(ResolvedSource {
            kind: SourceKind::YouTube,
            id: id.to_string(),
        });
    }
    if let Some(id) = douyin::extract_video_id(url) {
        return Some(ResolvedSource {
            kind: SourceKind::Douyin,
            id: id.to_string(),
        });
    }
    generic::synthesize_id(url, nonce).map(|id| ResolvedSource {
        kind: SourceKind::Generic,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_youtube_before_generic() {
        let resolved = classify_with_nonce("https://www.youtube.com/watch?v=dQw4w9WgXcQ", 0)
            .expect("youtube URL should classify");
        assert_eq!(resolved.kind, SourceKind::YouTube);
        assert_eq!(resolved.id, "dQw4w9WgXcQ");
    }

    #[test]
    fn routes_douyin_share_links() {
        let resolved =
            classify_with_nonce("https://v.douyin.com/iRNBho6u/", 0).expect("share link");
        assert_eq!(resolved.kind, SourceKind::Douyin);
        assert_eq!(resolved.id, "iRNBho6u");
    }

    #[test]
    fn falls_back_to_generic_for_plain_http() {
        let resolved =
            classify_with_nonce("https://example.com/clips/video.mp4", 7).expect("generic");
        assert_eq!(resolved.kind, SourceKind::Generic);
        assert!(resolved.id.starts_with("site-"));
        assert!(resolved.id.ends_with("-7"));
    }

    #[test]
    fn rejects_non_urls() {
        assert_eq!(classify_with_nonce("not a url at all", 0), None);
        assert_eq!(classify_with_nonce("", 0), None);
        assert_eq!(classify_with_nonce("ftp://example.com/file", 0), None);
    }

    #[test]
    fn wire_names_match_server_contract() {
        assert_eq!(SourceKind::YouTube.as_str(), "youtube");
        assert_eq!(SourceKind::Douyin.as_str(), "douyin");
        assert_eq!(SourceKind::Generic.as_str(), "generic");
    }
}
