//! Durable key-value persistence contract.
//!
//! The engine persists a handful of JSON/string values (last split result,
//! current artifact references) so a reloaded UI can resume mid-session. The
//! storage mechanism itself is the host's concern; [`MemoryStore`] backs tests
//! and headless use.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

/// Fixed keys for the persisted media state.
pub mod keys {
    /// Raw segment list from the most recent split, as JSON.
    pub const LAST_SPLIT_RESULT: &str = "subprep.last_split_result";
    /// Server path or URL of the current video artifact.
    pub const CURRENT_VIDEO_URL: &str = "subprep.current_video_url";
    /// Session id of the currently cached in-memory file.
    pub const CURRENT_FILE_CACHE_ID: &str = "subprep.current_file_cache_id";
    /// Last active UI surface, used to decide whether cached state applies.
    pub const ACTIVE_TAB: &str = "subprep.active_tab";
}

/// Keys cleared together when the working context changes.
pub const MEDIA_KEYS: &[&str] = &[
    keys::LAST_SPLIT_RESULT,
    keys::CURRENT_VIDEO_URL,
    keys::CURRENT_FILE_CACHE_ID,
];

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, key: &str, value: String) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Clear all media-scoped keys (tab switch, cache-clear action).
pub async fn clear_media_state(store: &dyn KeyValueStore) -> Result<()> {
    for key in MEDIA_KEYS {
        store.remove(key).await?;
    }
    Ok(())
}

/// In-memory [`KeyValueStore`] for tests and headless runs.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_values() {
        let store = MemoryStore::new();
        store.put(keys::ACTIVE_TAB, "subtitles".into()).await.unwrap();
        assert_eq!(
            store.get(keys::ACTIVE_TAB).await.unwrap().as_deref(),
            Some("subtitles")
        );
        store.remove(keys::ACTIVE_TAB).await.unwrap();
        assert_eq!(store.get(keys::ACTIVE_TAB).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_media_state_leaves_unrelated_keys() {
        let store = MemoryStore::new();
        store
            .put(keys::LAST_SPLIT_RESULT, "[]".into())
            .await
            .unwrap();
        store
            .put(keys::CURRENT_VIDEO_URL, "/videos/a.mp4".into())
            .await
            .unwrap();
        store.put(keys::ACTIVE_TAB, "settings".into()).await.unwrap();

        clear_media_state(&store).await.unwrap();

        assert_eq!(store.get(keys::LAST_SPLIT_RESULT).await.unwrap(), None);
        assert_eq!(store.get(keys::CURRENT_VIDEO_URL).await.unwrap(), None);
        assert_eq!(
            store.get(keys::ACTIVE_TAB).await.unwrap().as_deref(),
            Some("settings")
        );
    }
}
