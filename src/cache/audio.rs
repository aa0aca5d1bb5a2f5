use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bundle::{Definition, TranscriptRecord};
use crate::progress::ConsoleProgress;

use super::{CacheSpace, CacheStore};

/// External speech-to-text capability. Must only ever be invoked after a
/// cache miss for the same file hash: a cache hit avoids re-uploading the
/// audio payload entirely.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &[u8]) -> anyhow::Result<TranscriptRecord>;
}

/// Audio-hash-scoped caches: one transcript per file hash, plus phrase
/// translations scoped to "this audio file's vocabulary". Independent of the
/// text-hash bundle cache; the two are never reconciled.
pub struct AudioCache {
    store: Arc<dyn CacheStore>,
    progress: Arc<ConsoleProgress>,
}

impl AudioCache {
    pub fn new(store: Arc<dyn CacheStore>, progress: Arc<ConsoleProgress>) -> Self {
        Self { store, progress }
    }

    /// Cached transcript for a file hash. Read failures count as a miss.
    pub fn transcript(&self, file_hash: &str) -> Option<TranscriptRecord> {
        let record = self.read_record(file_hash)?;
        serde_json::from_value::<TranscriptRecord>(record).ok()
    }

    pub fn put_transcript(&self, file_hash: &str, rec: &TranscriptRecord) {
        let patch = match serde_json::to_value(rec) {
            Ok(v) => v,
            Err(e) => {
                self.progress.warn(format!("serialize transcript: {e}"));
                return;
            }
        };
        if let Err(e) = self.store.upsert_merge(CacheSpace::Audio, file_hash, patch) {
            self.progress
                .warn(format!("cache transcript {file_hash}: {e}"));
        }
    }

    /// Checks the transcript cache before invoking the transcriber; on a warm
    /// hash the transcriber (and therefore any upload) is skipped entirely.
    pub fn transcribe_cached(
        &self,
        transcriber: &dyn Transcriber,
        audio: &[u8],
        file_hash: &str,
    ) -> anyhow::Result<TranscriptRecord> {
        if let Some(cached) = self.transcript(file_hash) {
            self.progress.info(format!("transcript cache hit: {file_hash}"));
            return Ok(cached);
        }
        let rec = transcriber.transcribe(audio)?;
        self.put_transcript(file_hash, &rec);
        Ok(rec)
    }

    /// Phrase translations previously resolved for this audio file.
    pub fn phrase_translations(&self, audio_hash: &str) -> BTreeMap<String, Definition> {
        let Some(record) = self.read_record(audio_hash) else {
            return BTreeMap::new();
        };
        record
            .get("translations")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Upsert-merge: existing translations for other phrases are preserved.
    pub fn merge_phrase_translations(
        &self,
        audio_hash: &str,
        translations: &BTreeMap<String, Definition>,
    ) {
        if translations.is_empty() {
            return;
        }
        let patch = match serde_json::to_value(translations) {
            Ok(v) => serde_json::json!({ "translations": v }),
            Err(e) => {
                self.progress.warn(format!("serialize translations: {e}"));
                return;
            }
        };
        if let Err(e) = self.store.upsert_merge(CacheSpace::Audio, audio_hash, patch) {
            self.progress
                .warn(format!("cache translations {audio_hash}: {e}"));
        }
    }

    fn read_record(&self, key: &str) -> Option<serde_json::Value> {
        match self.store.get(CacheSpace::Audio, key) {
            Ok(v) => v,
            Err(e) => {
                self.progress.warn(format!("audio cache read {key}: {e}"));
                None
            }
        }
    }
}
