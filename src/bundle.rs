use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Gloss assigned when neither the dictionary nor the LLM produced one.
pub const NO_DEFINITION: &str = "No definition found";

/// Placeholder assigned to a sentence the LLM failed to translate.
pub const NO_TRANSLATION: &str = "Translation unavailable";

/// One segmentation unit. `start`/`end` are offsets counted in Unicode scalar
/// values of the source text, such that the phrase sequence partitions the
/// whole text with no gaps or overlaps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Phrase {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// A short gloss attached to a phrase text. Identical phrase text anywhere in
/// the document shares one definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub pinyin: String,
    pub gloss: String,
}

impl Definition {
    pub fn new(pinyin: impl Into<String>, gloss: impl Into<String>) -> Self {
        Self {
            pinyin: pinyin.into(),
            gloss: gloss.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            pinyin: String::new(),
            gloss: NO_DEFINITION.to_string(),
        }
    }
}

/// The unit of caching: everything the reader UI needs for one text, keyed
/// externally by the text hash. `sentence_translations` is populated lazily;
/// once present it is never removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisBundle {
    pub phrases: Vec<Phrase>,
    pub definitions: BTreeMap<String, Definition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_translations: Option<BTreeMap<String, String>>,
}

impl AnalysisBundle {
    /// A bundle is complete once sentence translations have been computed.
    pub fn is_complete(&self) -> bool {
        self.sentence_translations.is_some()
    }
}

/// Result of one speech-to-text call, cached by audio file hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_probability: Option<f64>,
}
