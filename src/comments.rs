use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::storage::StoragePort;

pub const STORAGE_KEY: &str = "reelfeed.comments";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommentError {
    #[error("comment text is empty")]
    EmptyText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub user: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl CommentRecord {
    /// Builds a record with a fresh id, stamped now. Text is trimmed.
    pub fn compose(user: &str, text: &str) -> Result<Self, CommentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommentError::EmptyText);
        }
        let user = user.trim();
        Ok(Self {
            id: unique_id(),
            user: if user.is_empty() { "You" } else { user }.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        })
    }
}

fn unique_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("c{}-{suffix}", Utc::now().timestamp_millis())
}

type CommentMap = BTreeMap<String, Vec<CommentRecord>>;

/// Append-only per-video comment log persisted through a [`StoragePort`].
///
/// The whole mapping lives under [`STORAGE_KEY`] and is rewritten on every
/// mutation. Storage failures never escape: a failed read leaves the store
/// working from memory only, retrying the read on every access and never
/// writing over the stored mapping until a read succeeds. A failed save is
/// logged. Two processes sharing one database resolve concurrent saves as
/// last writer wins.
pub struct CommentsStore<P: StoragePort> {
    port: P,
    cache: Option<CommentMap>,
    degraded: bool,
}

enum Loaded {
    Map(CommentMap),
    Unavailable,
}

impl<P: StoragePort> CommentsStore<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            cache: None,
            degraded: false,
        }
    }

    pub fn get_comments(&mut self, video_id: &str) -> Vec<CommentRecord> {
        self.ensure_seeded(video_id).clone()
    }

    pub fn add_comment(
        &mut self,
        video_id: &str,
        record: CommentRecord,
    ) -> Result<Vec<CommentRecord>, CommentError> {
        if record.text.trim().is_empty() {
            return Err(CommentError::EmptyText);
        }
        self.ensure_seeded(video_id);
        let comments = {
            let map = self.map();
            let entry = map.entry(video_id.to_string()).or_default();
            entry.push(record);
            entry.clone()
        };
        self.save();
        Ok(comments)
    }

    fn ensure_seeded(&mut self, video_id: &str) -> &Vec<CommentRecord> {
        let map = self.map();
        if map.get(video_id).map_or(true, Vec::is_empty) {
            map.insert(video_id.to_string(), default_comments(video_id));
            log::debug!("comments: seeded defaults for {video_id}");
            self.save();
        }
        self.map().entry(video_id.to_string()).or_default()
    }

    fn map(&mut self) -> &mut CommentMap {
        if self.cache.is_none() || self.degraded {
            match self.load() {
                Loaded::Map(mut stored) => {
                    if let Some(local) = self.cache.take() {
                        merge_local(&mut stored, local);
                    }
                    if self.degraded {
                        log::info!("comments: storage readable again");
                    }
                    self.degraded = false;
                    self.cache = Some(stored);
                }
                Loaded::Unavailable => self.degraded = true,
            }
        }
        self.cache.get_or_insert_with(CommentMap::new)
    }

    fn load(&self) -> Loaded {
        let raw = match self.port.get(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Loaded::Map(CommentMap::new()),
            Err(err) => {
                log::warn!("comments: load failed, using memory until it recovers: {err:#}");
                return Loaded::Unavailable;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Loaded::Map(map),
            Err(err) => {
                log::warn!("comments: stored data is corrupt, starting empty: {err}");
                Loaded::Map(CommentMap::new())
            }
        }
    }

    fn save(&self) {
        if self.degraded {
            log::debug!("comments: skipping save while storage is unreadable");
            return;
        }
        let Some(map) = self.cache.as_ref() else {
            return;
        };
        let serialized = match serde_json::to_string(map) {
            Ok(serialized) => serialized,
            Err(err) => {
                log::warn!("comments: serialize failed: {err}");
                return;
            }
        };
        if let Err(err) = self.port.set(STORAGE_KEY, &serialized) {
            log::warn!("comments: save failed: {err:#}");
        }
    }
}

/// Folds records written while storage was unreadable into the stored map.
fn merge_local(stored: &mut CommentMap, local: CommentMap) {
    for (video_id, records) in local {
        let entry = stored.entry(video_id).or_default();
        for record in records {
            if !entry.iter().any(|existing| existing.id == record.id) {
                entry.push(record);
            }
        }
    }
}

fn default_comments(video_id: &str) -> Vec<CommentRecord> {
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    vec![
        CommentRecord {
            id: "c1".into(),
            user: "reelfan".into(),
            text: format!("First! Loving {video_id} already."),
            created_at: epoch,
        },
        CommentRecord {
            id: "c2".into(),
            user: "nightowl".into(),
            text: "The music on this one is perfect.".into(),
            created_at: epoch,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use anyhow::{anyhow, Result};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct BrokenStorage;

    /// Memory storage whose next `failing_reads` reads error out.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        failing_reads: AtomicUsize,
    }

    impl StoragePort for FlakyStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            let failing = self.failing_reads.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_reads.store(failing - 1, Ordering::SeqCst);
                return Err(anyhow!("database is locked"));
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value)
        }
    }

    impl StoragePort for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("disk unavailable"))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("disk unavailable"))
        }
    }

    fn record(id: &str, user: &str, text: &str) -> CommentRecord {
        CommentRecord {
            id: id.into(),
            user: user.into(),
            text: text.into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn first_access_seeds_two_defaults_once() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = CommentsStore::new(storage.clone());
        let first = store.get_comments("v1");
        let second = store.get_comments("v1");
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        let ids: Vec<_> = first.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        assert!(storage.get(STORAGE_KEY).unwrap().is_some());
    }

    #[test]
    fn add_comment_appends_after_seed() {
        let mut store = CommentsStore::new(MemoryStorage::new());
        assert_eq!(store.get_comments("v1").len(), 2);
        let updated = store
            .add_comment("v1", record("c3", "Alex", "hi"))
            .unwrap();
        assert_eq!(updated.len(), 3);
        assert_eq!(updated.last().unwrap().text, "hi");

        let listed = store.get_comments("v1");
        let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
    }

    #[test]
    fn add_comment_seeds_missing_video_first() {
        let mut store = CommentsStore::new(MemoryStorage::new());
        let updated = store
            .add_comment("fresh", record("x", "Sam", "hello"))
            .unwrap();
        assert_eq!(updated.len(), 3);
        assert_eq!(updated[2].id, "x");
    }

    #[test]
    fn rejects_blank_text() {
        let mut store = CommentsStore::new(MemoryStorage::new());
        let err = store
            .add_comment("v1", record("c9", "Sam", "   "))
            .unwrap_err();
        assert_eq!(err, CommentError::EmptyText);
        assert_eq!(CommentRecord::compose("Sam", "\n"), Err(CommentError::EmptyText));
    }

    #[test]
    fn state_survives_a_new_store_on_same_port() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let mut store = CommentsStore::new(storage.clone());
            store.add_comment("v2", record("c3", "Alex", "kept")).unwrap();
        }
        let mut store = CommentsStore::new(storage);
        let listed = store.get_comments("v2");
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[2].text, "kept");
    }

    #[test]
    fn corrupt_payload_degrades_to_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(STORAGE_KEY, "{not json").unwrap();
        let mut store = CommentsStore::new(storage);
        assert_eq!(store.get_comments("v1").len(), 2);
    }

    #[test]
    fn failing_storage_never_panics() {
        let mut store = CommentsStore::new(BrokenStorage);
        assert_eq!(store.get_comments("v1").len(), 2);
        let updated = store.add_comment("v1", record("c3", "Alex", "hi")).unwrap();
        assert_eq!(updated.len(), 3);
    }

    #[test]
    fn failed_read_does_not_overwrite_other_videos() {
        let storage = Arc::new(FlakyStorage::default());
        {
            let mut store = CommentsStore::new(storage.clone());
            store.add_comment("v2", record("c3", "Alex", "keep me")).unwrap();
        }

        storage.failing_reads.store(1, Ordering::SeqCst);
        let mut store = CommentsStore::new(storage.clone());
        assert_eq!(store.get_comments("v1").len(), 2);
        let stored = storage.get(STORAGE_KEY).unwrap().unwrap();
        assert!(stored.contains("keep me"));

        let v2 = store.get_comments("v2");
        assert_eq!(v2.len(), 3);
        assert_eq!(v2[2].text, "keep me");
    }

    #[test]
    fn comments_added_while_unreadable_are_kept_after_recovery() {
        let storage = Arc::new(FlakyStorage::default());
        {
            let mut store = CommentsStore::new(storage.clone());
            store.add_comment("v2", record("c3", "Alex", "keep me")).unwrap();
        }

        storage.failing_reads.store(2, Ordering::SeqCst);
        let mut store = CommentsStore::new(storage.clone());
        let offline = store
            .add_comment("v1", record("c4", "Sam", "written offline"))
            .unwrap();
        assert_eq!(offline.len(), 3);

        let v1 = store.get_comments("v1");
        let ids: Vec<_> = v1.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2", "c4"]);
        let stored = storage.get(STORAGE_KEY).unwrap().unwrap();
        assert!(stored.contains("keep me"));
        assert!(stored.contains("written offline"));
    }

    #[test]
    fn stored_empty_list_is_seeded() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(STORAGE_KEY, r#"{"v1": []}"#).unwrap();
        let mut store = CommentsStore::new(storage.clone());
        let listed = store.get_comments("v1");
        let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        assert!(storage.get(STORAGE_KEY).unwrap().unwrap().contains("c1"));
    }

    #[test]
    fn serialized_layout_uses_created_at_key() {
        let json = serde_json::to_value(record("c3", "Alex", "hi")).unwrap();
        assert_eq!(json["createdAt"], "2024-05-01T12:00:00Z");
        assert_eq!(json["user"], "Alex");
    }

    #[test]
    fn compose_trims_and_generates_ids() {
        let a = CommentRecord::compose("Alex", "  nice clip ").unwrap();
        let b = CommentRecord::compose("", "again").unwrap();
        assert_eq!(a.text, "nice clip");
        assert_eq!(b.user, "You");
        assert_ne!(a.id, b.id);
    }
}
