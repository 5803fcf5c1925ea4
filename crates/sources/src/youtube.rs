//! YouTube URL recognition and video id extraction.

use std::sync::LazyLock;

use regex::Regex;

/// Matches the standard watch/share/embed URL shapes and captures the
/// 11-character video id. A trailing id character is rejected via the
/// boundary alternation so over-long ids do not partially match.
pub static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:https?://)?(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?(?:[^#\s]*&)?v=|embed/|v/|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    )
    .unwrap()
});

/// Extract the 11-character video id from any recognized URL shape.
///
/// Returns `None` when no valid id is present; callers treat this as invalid
/// input, never as a failure.
pub fn extract_video_id(url: &str) -> Option<&str> {
    URL_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    #[case("http://youtube.com/watch?v=dQw4w9WgXcQ")]
    #[case("https://www.youtube.com/watch?list=PL123&v=dQw4w9WgXcQ")]
    #[case("https://youtu.be/dQw4w9WgXcQ")]
    #[case("https://youtu.be/dQw4w9WgXcQ?t=42")]
    #[case("https://www.youtube.com/embed/dQw4w9WgXcQ")]
    #[case("https://www.youtube.com/v/dQw4w9WgXcQ")]
    #[case("https://www.youtube.com/shorts/dQw4w9WgXcQ")]
    #[case("https://m.youtube.com/watch?v=dQw4w9WgXcQ")]
    #[case("www.youtube.com/watch?v=dQw4w9WgXcQ")]
    fn extracts_the_same_id_from_every_shape(#[case] url: &str) {
        assert_eq!(extract_video_id(url), Some("dQw4w9WgXcQ"));
    }

    #[rstest]
    #[case("https://www.youtube.com/watch?v=shortid")]
    #[case("https://youtu.be/abc")]
    #[case("https://www.youtube.com/")]
    #[case("https://example.com/watch?v=dQw4w9WgXcQ")]
    #[case("just some text")]
    fn rejects_urls_without_a_valid_id(#[case] url: &str) {
        assert_eq!(extract_video_id(url), None);
    }

    #[test]
    fn rejects_over_long_ids() {
        // Twelve id characters: must not truncate-match the first eleven.
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQQ"),
            None
        );
    }

    #[test]
    fn id_may_contain_underscore_and_dash() {
        assert_eq!(
            extract_video_id("https://youtu.be/a_b-c_d-e_f"),
            Some("a_b-c_d-e_f")
        );
    }
}
