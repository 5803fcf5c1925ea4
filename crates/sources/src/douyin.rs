//! Douyin URL recognition: canonical video pages and v.douyin.com share links.

use std::sync::LazyLock;

use regex::Regex;

/// Canonical video page, e.g. `https://www.douyin.com/video/7123456789012345678`.
pub static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://)?(?:www\.)?douyin\.com/video/(\d+)").unwrap()
});

/// Short share link, e.g. `https://v.douyin.com/iRNBho6u/`. The share code is
/// used as-is; the companion server resolves it to the canonical video.
pub static SHARE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://)?v\.douyin\.com/([A-Za-z0-9]+)").unwrap());

/// Extract the platform id from either URL shape.
pub fn extract_video_id(url: &str) -> Option<&str> {
    for pattern in [&URL_REGEX, &SHARE_REGEX] {
        if let Some(id) = pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
        {
            return Some(id);
        }
    }
    None
}
