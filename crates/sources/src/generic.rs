//! Generic-site id synthesis for arbitrary yt-dlp-capable URLs.

use sha2::{Digest, Sha256};
use url::Url;

/// Length of the hex digest prefix folded into a synthesized id.
const DIGEST_PREFIX_LEN: usize = 12;

/// Synthesize a session id from the normalized host + path of a URL plus a
/// caller-provided nonce.
///
/// The nonce (a creation timestamp in production) guarantees uniqueness across
/// repeated downloads of the same logical resource; callers wanting dedup must
/// supply a stable id instead. Only http(s) URLs qualify.
pub fn synthesize_id(url: &str, nonce: i64) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);

    let mut hasher = Sha256::new();
    hasher.update(host.as_bytes());
    hasher.update(parsed.path().as_bytes());
    let digest = hex::encode(hasher.finalize());

    Some(format!("site-{}-{}", &digest[..DIGEST_PREFIX_LEN], nonce))
}
