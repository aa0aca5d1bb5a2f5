use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bundle::NO_TRANSLATION;
use crate::models::ChatModel;
use crate::progress::ConsoleProgress;

use super::batch::{resolve_numbered_batches, BatchSettings};
use super::trace::TraceWriter;

/// Batched sentence translation with the same numbered protocol and
/// degradation policy as definition resolution: an unmatched sentence gets
/// the "Translation unavailable" placeholder, transport errors never
/// propagate upward.
pub struct SentenceTranslator {
    model: Arc<dyn ChatModel>,
    prompt: String,
    settings: BatchSettings,
    trace: Arc<TraceWriter>,
    progress: Arc<ConsoleProgress>,
}

impl SentenceTranslator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        prompt: String,
        settings: BatchSettings,
        trace: Arc<TraceWriter>,
        progress: Arc<ConsoleProgress>,
    ) -> Self {
        Self {
            model,
            prompt,
            settings,
            trace,
            progress,
        }
    }

    pub fn translate(&self, sentences: &[String]) -> BTreeMap<String, String> {
        let mut out: BTreeMap<String, String> = BTreeMap::new();
        if sentences.is_empty() {
            return out;
        }
        self.progress
            .info(format!("translating {} sentences", sentences.len()));

        let replies = resolve_numbered_batches(
            self.model.as_ref(),
            &self.prompt,
            sentences,
            self.settings,
            "translate",
            &self.trace,
            &self.progress,
        );
        for (i, sentence) in sentences.iter().enumerate() {
            let translation = replies
                .get(&i)
                .cloned()
                .unwrap_or_else(|| NO_TRANSLATION.to_string());
            out.insert(sentence.clone(), translation);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::SentenceTranslator;
    use crate::bundle::NO_TRANSLATION;
    use crate::models::ChatModel;
    use crate::pipeline::batch::BatchSettings;
    use crate::pipeline::prompts::DEFAULT_TRANSLATE_BATCH_TEXT;
    use crate::pipeline::trace::TraceWriter;
    use crate::progress::ConsoleProgress;

    struct FixedModel(anyhow::Result<String>);

    impl ChatModel for FixedModel {
        fn chat(&self, _prompt: &str) -> anyhow::Result<String> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn translator(reply: anyhow::Result<String>) -> SentenceTranslator {
        SentenceTranslator::new(
            Arc::new(FixedModel(reply)),
            DEFAULT_TRANSLATE_BATCH_TEXT.to_string(),
            BatchSettings {
                max_items: 16,
                max_chars: 4000,
            },
            Arc::new(TraceWriter::disabled()),
            Arc::new(ConsoleProgress::new(false)),
        )
    }

    fn sentences() -> Vec<String> {
        vec!["我爱学习。".to_string(), "你呢？".to_string()]
    }

    #[test]
    fn maps_sentences_to_translations() {
        let t = translator(Ok("1. I love studying.\n2. And you?".to_string()));
        let map = t.translate(&sentences());
        assert_eq!(map["我爱学习。"], "I love studying.");
        assert_eq!(map["你呢？"], "And you?");
    }

    #[test]
    fn missing_numbers_get_the_placeholder() {
        let t = translator(Ok("2. And you?".to_string()));
        let map = t.translate(&sentences());
        assert_eq!(map["我爱学习。"], NO_TRANSLATION);
        assert_eq!(map["你呢？"], "And you?");
    }

    #[test]
    fn transport_errors_fail_closed_to_placeholders() {
        let t = translator(Err(anyhow::anyhow!("timeout")));
        let map = t.translate(&sentences());
        assert_eq!(map.len(), 2);
        assert!(map.values().all(|v| v == NO_TRANSLATION));
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let t = translator(Ok("1. x".to_string()));
        assert!(t.translate(&[]).is_empty());
    }
}
