use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::bundle::{Definition, Phrase};
use crate::dict::Dictionary;
use crate::models::ChatModel;
use crate::progress::ConsoleProgress;
use crate::textutil::contains_cjk;

use super::batch::{resolve_numbered_batches, BatchSettings};
use super::trace::TraceWriter;

/// Resolves a gloss for every Chinese-bearing phrase: static dictionary
/// first, one batched LLM call for the misses. Per-phrase failures degrade to
/// the "No definition found" sentinel; this never raises.
pub struct DefinitionResolver {
    dict: Arc<Dictionary>,
    model: Arc<dyn ChatModel>,
    prompt: String,
    settings: BatchSettings,
    trace: Arc<TraceWriter>,
    progress: Arc<ConsoleProgress>,
}

impl DefinitionResolver {
    pub fn new(
        dict: Arc<Dictionary>,
        model: Arc<dyn ChatModel>,
        prompt: String,
        settings: BatchSettings,
        trace: Arc<TraceWriter>,
        progress: Arc<ConsoleProgress>,
    ) -> Self {
        Self {
            dict,
            model,
            prompt,
            settings,
            trace,
            progress,
        }
    }

    pub fn resolve(&self, phrases: &[Phrase]) -> BTreeMap<String, Definition> {
        let texts: Vec<String> = phrases.iter().map(|p| p.text.clone()).collect();
        self.resolve_texts(&texts)
    }

    /// Like `resolve`, plus `known` entries (e.g. an audio file's cached
    /// vocabulary) that pre-empt both dictionary and LLM.
    pub fn resolve_texts_with(
        &self,
        texts: &[String],
        known: &BTreeMap<String, Definition>,
    ) -> BTreeMap<String, Definition> {
        let mut out: BTreeMap<String, Definition> = BTreeMap::new();
        let mut missing: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for text in texts {
            // Punctuation/Latin/digit-only phrases carry no lexical definition.
            if !contains_cjk(text) || !seen.insert(text.as_str()) {
                continue;
            }
            if let Some(def) = known.get(text) {
                out.insert(text.clone(), def.clone());
            } else if let Some(def) = self.dict.lookup(text) {
                out.insert(text.clone(), def);
            } else {
                missing.push(text.clone());
            }
        }

        if missing.is_empty() {
            return out;
        }
        self.progress.info(format!(
            "definitions: {} dictionary hits, {} sent to llm",
            out.len(),
            missing.len()
        ));

        let replies = resolve_numbered_batches(
            self.model.as_ref(),
            &self.prompt,
            &missing,
            self.settings,
            "define",
            &self.trace,
            &self.progress,
        );
        for (i, text) in missing.into_iter().enumerate() {
            let def = replies
                .get(&i)
                .map(|payload| parse_definition_payload(payload))
                .unwrap_or_else(Definition::not_found);
            out.insert(text, def);
        }
        out
    }

    pub fn resolve_texts(&self, texts: &[String]) -> BTreeMap<String, Definition> {
        self.resolve_texts_with(texts, &BTreeMap::new())
    }
}

/// Reply line shape: `[pinyin] gloss`. A missing or empty bracket leaves the
/// pinyin empty; the remainder is the gloss.
fn parse_definition_payload(payload: &str) -> Definition {
    let payload = payload.trim();
    if let Some(rest) = payload.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let pinyin = rest[..end].trim().to_string();
            let gloss = rest[end + 1..].trim().to_string();
            if !gloss.is_empty() {
                return Definition::new(pinyin, gloss);
            }
        }
    }
    if payload.is_empty() {
        return Definition::not_found();
    }
    Definition::new("", payload)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{parse_definition_payload, DefinitionResolver};
    use crate::bundle::{Definition, Phrase, NO_DEFINITION};
    use crate::dict::Dictionary;
    use crate::models::ChatModel;
    use crate::pipeline::batch::BatchSettings;
    use crate::pipeline::prompts::DEFAULT_DEFINE_BATCH_TEXT;
    use crate::pipeline::trace::TraceWriter;
    use crate::progress::ConsoleProgress;

    struct MockModel {
        calls: Arc<AtomicUsize>,
        prompts: Arc<Mutex<Vec<String>>>,
        reply: anyhow::Result<String>,
    }

    impl MockModel {
        fn new(reply: anyhow::Result<String>) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                prompts: Arc::new(Mutex::new(Vec::new())),
                reply,
            }
        }
    }

    impl ChatModel for MockModel {
        fn chat(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().expect("prompts").push(prompt.to_string());
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn resolver(model: MockModel) -> (DefinitionResolver, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let calls = model.calls.clone();
        let prompts = model.prompts.clone();
        let dict = Dictionary::parse(
            "我 我 [wo3] /I/me/\n\
             愛 爱 [ai4] /to love/\n\
             學習 学习 [xue2 xi2] /to study/\n",
        );
        let r = DefinitionResolver::new(
            Arc::new(dict),
            Arc::new(model),
            DEFAULT_DEFINE_BATCH_TEXT.to_string(),
            BatchSettings {
                max_items: 16,
                max_chars: 4000,
            },
            Arc::new(TraceWriter::disabled()),
            Arc::new(ConsoleProgress::new(false)),
        );
        (r, calls, prompts)
    }

    fn phrases(texts: &[&str]) -> Vec<Phrase> {
        let mut start = 0;
        texts
            .iter()
            .map(|t| {
                let len = t.chars().count();
                let p = Phrase::new(*t, start, start + len);
                start += len;
                p
            })
            .collect()
    }

    #[test]
    fn non_lexical_phrases_are_skipped_entirely() {
        let (r, calls, _) = resolver(MockModel::new(Ok(String::new())));
        let out = r.resolve(&phrases(&["，", "123", "abc"]));
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dictionary_hits_never_reach_the_llm() {
        let (r, calls, _) = resolver(MockModel::new(Ok(String::new())));
        let out = r.resolve(&phrases(&["我", "爱", "学习", "。"]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(out.len(), 3);
        assert_eq!(out["学习"].gloss, "to study");
        assert_eq!(out["学习"].pinyin, "xue2 xi2");
        assert!(!out.contains_key("。"));
    }

    #[test]
    fn misses_go_to_one_batched_call() {
        let (r, calls, prompts) = resolver(MockModel::new(Ok(
            "1. [diàn nǎo] computer\n2. [shǒu jī] mobile phone".to_string(),
        )));
        let out = r.resolve(&phrases(&["我", "电脑", "手机"]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let prompt = prompts.lock().expect("prompts")[0].clone();
        assert!(prompt.contains("1. 电脑"));
        assert!(prompt.contains("2. 手机"));
        assert!(!prompt.contains("我"));
        assert_eq!(out["电脑"], Definition::new("diàn nǎo", "computer"));
        assert_eq!(out["手机"], Definition::new("shǒu jī", "mobile phone"));
    }

    #[test]
    fn llm_failure_degrades_to_sentinels_without_raising() {
        let (r, _, _) = resolver(MockModel::new(Err(anyhow::anyhow!("503"))));
        let out = r.resolve(&phrases(&["电脑", "手机"]));
        assert_eq!(out.len(), 2);
        for def in out.values() {
            assert_eq!(def.gloss, NO_DEFINITION);
            assert!(def.pinyin.is_empty());
        }
    }

    #[test]
    fn dropped_reply_numbers_degrade_per_phrase() {
        let (r, _, _) = resolver(MockModel::new(Ok("2. [shǒu jī] mobile phone".to_string())));
        let out = r.resolve(&phrases(&["电脑", "手机"]));
        assert_eq!(out["电脑"].gloss, NO_DEFINITION);
        assert_eq!(out["手机"].gloss, "mobile phone");
    }

    #[test]
    fn known_entries_preempt_dictionary_and_llm() {
        let (r, calls, _) = resolver(MockModel::new(Ok(String::new())));
        let known = BTreeMap::from([(
            "我".to_string(),
            Definition::new("wǒ", "me (cached)"),
        )]);
        let out = r.resolve_texts_with(&["我".to_string()], &known);
        assert_eq!(out["我"].gloss, "me (cached)");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn payload_parsing_variants() {
        assert_eq!(
            parse_definition_payload("[xué xí] to study"),
            Definition::new("xué xí", "to study")
        );
        assert_eq!(
            parse_definition_payload("just a gloss"),
            Definition::new("", "just a gloss")
        );
        assert_eq!(parse_definition_payload("  "), Definition::not_found());
    }
}
