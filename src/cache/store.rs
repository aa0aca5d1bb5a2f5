use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use serde_json::Value;

/// The two independent content-addressed key spaces. Text-hash bundles and
/// audio-hash records never share keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheSpace {
    Text,
    Audio,
}

impl CacheSpace {
    fn dir_name(self) -> &'static str {
        match self {
            CacheSpace::Text => "text",
            CacheSpace::Audio => "audio",
        }
    }
}

/// Generic key-value cache with upsert-by-key semantics. The pipeline never
/// deletes records; conflict resolution is "merge new fields into existing
/// record", never a destructive overwrite of fields absent from the write.
pub trait CacheStore: Send + Sync {
    fn get(&self, space: CacheSpace, key: &str) -> anyhow::Result<Option<Value>>;
    fn upsert_merge(&self, space: CacheSpace, key: &str, patch: Value) -> anyhow::Result<()>;
}

/// Merges `patch` into `existing`. Objects merge recursively, `null` patch
/// fields are skipped (a write can add or replace fields, never remove them),
/// anything else is replaced by the patch value.
pub fn merge_records(existing: &mut Value, patch: Value) {
    match (existing, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (k, v) in patch {
                if v.is_null() {
                    continue;
                }
                let nested = v.is_object()
                    && base.get(&k).map(Value::is_object).unwrap_or(false);
                if nested {
                    if let Some(slot) = base.get_mut(&k) {
                        merge_records(slot, v);
                    }
                } else {
                    base.insert(k, v);
                }
            }
        }
        (slot, patch) => {
            if !patch.is_null() {
                *slot = patch;
            }
        }
    }
}

/// One JSON file per key under `<root>/<space>/<key>.json`.
pub struct JsonDirStore {
    root: PathBuf,
    // Serializes read-merge-write cycles across threads of this process.
    write_lock: Mutex<()>,
}

impl JsonDirStore {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        for space in [CacheSpace::Text, CacheSpace::Audio] {
            let dir = root.join(space.dir_name());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create cache dir: {}", dir.display()))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn record_path(&self, space: CacheSpace, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!("invalid cache key: {key:?}"));
        }
        Ok(self.root.join(space.dir_name()).join(format!("{key}.json")))
    }
}

impl CacheStore for JsonDirStore {
    fn get(&self, space: CacheSpace, key: &str) -> anyhow::Result<Option<Value>> {
        let path = self.record_path(space, key)?;
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read cache record: {}", path.display()))
            }
        };
        let value: Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse cache record: {}", path.display()))?;
        Ok(Some(value))
    }

    fn upsert_merge(&self, space: CacheSpace, key: &str, patch: Value) -> anyhow::Result<()> {
        let path = self.record_path(space, key)?;
        let _guard = self.write_lock.lock().expect("store write lock");

        // A corrupt existing record is replaced rather than propagated.
        let mut record = std::fs::read(&path)
            .ok()
            .and_then(|b| serde_json::from_slice::<Value>(&b).ok())
            .unwrap_or(Value::Object(Default::default()));
        merge_records(&mut record, patch);

        let json = serde_json::to_string_pretty(&record).context("serialize cache record")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("write cache record: {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("commit cache record: {}", path.display()))?;
        Ok(())
    }
}

/// In-memory store used by tests and as a cache-less fallback.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(CacheSpace, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, space: CacheSpace, key: &str) -> anyhow::Result<Option<Value>> {
        let records = self.records.lock().expect("memory store lock");
        Ok(records.get(&(space, key.to_string())).cloned())
    }

    fn upsert_merge(&self, space: CacheSpace, key: &str, patch: Value) -> anyhow::Result<()> {
        let mut records = self.records.lock().expect("memory store lock");
        let slot = records
            .entry((space, key.to_string()))
            .or_insert(Value::Object(Default::default()));
        merge_records(slot, patch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{merge_records, CacheSpace, CacheStore, JsonDirStore, MemoryStore};

    #[test]
    fn merge_preserves_absent_fields_and_skips_nulls() {
        let mut record = json!({"phrases": [1, 2], "definitions": {"你": "you"}});
        merge_records(
            &mut record,
            json!({"sentence_translations": {"你呢？": "And you?"}, "phrases": null}),
        );
        assert_eq!(record["phrases"], json!([1, 2]));
        assert_eq!(record["definitions"]["你"], json!("you"));
        assert_eq!(record["sentence_translations"]["你呢？"], json!("And you?"));
    }

    #[test]
    fn merge_is_recursive_for_nested_maps() {
        let mut record = json!({"translations": {"你": {"gloss": "you"}}});
        merge_records(
            &mut record,
            json!({"translations": {"呢": {"gloss": "particle"}}}),
        );
        assert_eq!(record["translations"]["你"]["gloss"], json!("you"));
        assert_eq!(record["translations"]["呢"]["gloss"], json!("particle"));
    }

    #[test]
    fn memory_store_upserts_by_key() {
        let store = MemoryStore::new();
        store
            .upsert_merge(CacheSpace::Text, "abc123", json!({"a": 1}))
            .expect("upsert");
        store
            .upsert_merge(CacheSpace::Text, "abc123", json!({"b": 2}))
            .expect("upsert");
        let rec = store
            .get(CacheSpace::Text, "abc123")
            .expect("get")
            .expect("present");
        assert_eq!(rec, json!({"a": 1, "b": 2}));
        assert!(store
            .get(CacheSpace::Audio, "abc123")
            .expect("get")
            .is_none());
    }

    #[test]
    fn json_dir_store_round_trips() {
        let root = std::env::temp_dir().join(format!(
            "hanscan-store-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let store = JsonDirStore::open(&root).expect("open");
        assert!(store.get(CacheSpace::Text, "deadbeef").expect("get").is_none());
        store
            .upsert_merge(CacheSpace::Text, "deadbeef", json!({"x": "y"}))
            .expect("upsert");
        store
            .upsert_merge(CacheSpace::Text, "deadbeef", json!({"z": 3}))
            .expect("upsert");
        let rec = store
            .get(CacheSpace::Text, "deadbeef")
            .expect("get")
            .expect("present");
        assert_eq!(rec, json!({"x": "y", "z": 3}));
        assert!(store.get(CacheSpace::Text, "../evil").is_err());
        let _ = std::fs::remove_dir_all(&root);
    }
}
