use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};

use crate::bundle::{AnalysisBundle, Definition, NO_DEFINITION};
use crate::cache::{AudioCache, CacheSpace, CacheStore};
use crate::pipeline::definitions::DefinitionResolver;
use crate::pipeline::sentences::SentenceTranslator;
use crate::progress::ConsoleProgress;
use crate::segment::{verify_coverage, Segmenter};
use crate::textutil::split_sentences;

/// The pipeline entry point: content-addressed analysis with a lazily
/// completing persistent cache.
///
/// Cache states per text hash: absent (run the full pipeline), partial
/// (phrases + definitions cached, sentence translations computed on demand
/// and merged in), complete (returned verbatim; no further writes). Warm
/// repeats issue zero segmentation or LLM calls.
pub struct Analyzer {
    store: Arc<dyn CacheStore>,
    segmenter: Arc<dyn Segmenter>,
    resolver: DefinitionResolver,
    translator: SentenceTranslator,
    audio: AudioCache,
    progress: Arc<ConsoleProgress>,
    // Single-flight: at most one concurrent upstream computation per hash.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Analyzer {
    pub fn new(
        store: Arc<dyn CacheStore>,
        segmenter: Arc<dyn Segmenter>,
        resolver: DefinitionResolver,
        translator: SentenceTranslator,
        progress: Arc<ConsoleProgress>,
    ) -> Self {
        let audio = AudioCache::new(store.clone(), progress.clone());
        Self {
            store,
            segmenter,
            resolver,
            translator,
            audio,
            progress,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The audio-hash-scoped cache space, for the transcription flow.
    pub fn audio(&self) -> &AudioCache {
        &self.audio
    }

    /// Analyzes `text`, serving from the cache when possible.
    ///
    /// `text_hash` is caller-supplied and trusted to equal `hash(text)`;
    /// passing a stale hash is a caller bug, not a runtime error here.
    pub fn analyze(
        &self,
        text: &str,
        text_hash: &str,
        include_sentences: bool,
    ) -> anyhow::Result<AnalysisBundle> {
        if text.is_empty() {
            bail!("text must not be empty");
        }
        if text_hash.trim().is_empty() {
            bail!("text_hash must not be empty");
        }

        let key = self.key_lock(text_hash);
        let result = {
            let _guard = key.lock().expect("analysis key lock");
            self.analyze_locked(text, text_hash, include_sentences)
        };
        self.release_key(text_hash, &key);
        result
    }

    fn analyze_locked(
        &self,
        text: &str,
        text_hash: &str,
        include_sentences: bool,
    ) -> anyhow::Result<AnalysisBundle> {
        match self.load_bundle(text_hash) {
            // Complete bundles are terminal; cached sentence translations are
            // returned even when not asked for, never removed.
            Some(bundle) if bundle.is_complete() || !include_sentences => {
                self.progress.info(format!("analysis cache hit: {text_hash}"));
                Ok(bundle)
            }
            // Partial bundle, sentences wanted: compute and merge them in.
            Some(mut bundle) => {
                self.progress
                    .info(format!("completing cached analysis: {text_hash}"));
                let sentences = split_sentences(text);
                bundle.sentence_translations = Some(self.translator.translate(&sentences));
                self.persist(text_hash, &bundle);
                Ok(bundle)
            }
            None => {
                self.progress.info(format!("analyzing: {text_hash}"));
                let phrases = self.segmenter.segment(text).context("segment text")?;
                verify_coverage(text, &phrases).context("segmenter output")?;
                let definitions = self.resolver.resolve(&phrases);
                let sentence_translations = if include_sentences {
                    Some(self.translator.translate(&split_sentences(text)))
                } else {
                    None
                };
                let bundle = AnalysisBundle {
                    phrases,
                    definitions,
                    sentence_translations,
                };
                self.persist(text_hash, &bundle);
                Ok(bundle)
            }
        }
    }

    /// Resolves raw phrase strings; with an audio hash, that file's cached
    /// vocabulary pre-empts new lookups and newly resolved entries are merged
    /// back into its cache record.
    pub fn lookup_definitions(
        &self,
        phrases: &[String],
        audio_hash: Option<&str>,
    ) -> BTreeMap<String, Definition> {
        let Some(hash) = audio_hash else {
            return self.resolver.resolve_texts(phrases);
        };
        let known = self.audio.phrase_translations(hash);
        let out = self.resolver.resolve_texts_with(phrases, &known);
        // Sentinel glosses never enter the cache: an unresolved phrase is
        // re-asked once the backend recovers.
        let fresh: BTreeMap<String, Definition> = out
            .iter()
            .filter(|(k, v)| !known.contains_key(*k) && v.gloss != NO_DEFINITION)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.audio.merge_phrase_translations(hash, &fresh);
        out
    }

    /// A store read error or malformed record counts as a miss so analysis
    /// stays available in cache-degraded conditions.
    fn load_bundle(&self, text_hash: &str) -> Option<AnalysisBundle> {
        let record = match self.store.get(CacheSpace::Text, text_hash) {
            Ok(v) => v?,
            Err(e) => {
                self.progress
                    .warn(format!("cache read {text_hash}: {e}; recomputing"));
                return None;
            }
        };
        match serde_json::from_value::<AnalysisBundle>(record) {
            Ok(b) => Some(b),
            Err(e) => {
                self.progress
                    .warn(format!("malformed cache record {text_hash}: {e}; recomputing"));
                None
            }
        }
    }

    /// Best-effort: a failed write is logged and the computed bundle is still
    /// returned to the caller.
    fn persist(&self, text_hash: &str, bundle: &AnalysisBundle) {
        let patch = match serde_json::to_value(bundle) {
            Ok(v) => v,
            Err(e) => {
                self.progress.warn(format!("serialize bundle: {e}"));
                return;
            }
        };
        if let Err(e) = self.store.upsert_merge(CacheSpace::Text, text_hash, patch) {
            self.progress.warn(format!("cache write {text_hash}: {e}"));
        }
    }

    fn key_lock(&self, text_hash: &str) -> Arc<Mutex<()>> {
        let mut map = self.inflight.lock().expect("inflight map");
        map.entry(text_hash.to_string()).or_default().clone()
    }

    fn release_key(&self, text_hash: &str, key: &Arc<Mutex<()>>) {
        let mut map = self.inflight.lock().expect("inflight map");
        // Two strong refs mean map entry + our clone: nobody else is waiting.
        if Arc::strong_count(key) == 2 {
            map.remove(text_hash);
        }
    }
}
