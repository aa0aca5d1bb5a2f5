use std::sync::Arc;

use anyhow::anyhow;

use crate::bundle::Phrase;
use crate::dict::Dictionary;
use crate::textutil::is_cjk_char;

/// External word-segmentation capability. Segmentation is mandatory for
/// analysis: a failure here fails the whole analyze call.
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> anyhow::Result<Vec<Phrase>>;
}

/// Dictionary-driven segmenter: forward longest match over headwords for CJK
/// runs, single-character fallback, and contiguous non-CJK runs kept as one
/// phrase each.
pub struct DictSegmenter {
    dict: Arc<Dictionary>,
}

impl DictSegmenter {
    pub fn new(dict: Arc<Dictionary>) -> Self {
        Self { dict }
    }
}

impl Segmenter for DictSegmenter {
    fn segment(&self, text: &str) -> anyhow::Result<Vec<Phrase>> {
        let chars: Vec<char> = text.chars().collect();
        let mut phrases: Vec<Phrase> = Vec::new();
        let window = self.dict.max_key_chars().max(1);

        let mut i = 0usize;
        while i < chars.len() {
            if !is_cjk_char(chars[i]) {
                let mut j = i + 1;
                while j < chars.len() && !is_cjk_char(chars[j]) {
                    j += 1;
                }
                phrases.push(make_phrase(&chars, i, j));
                i = j;
                continue;
            }

            let mut matched = 1usize;
            let longest = window.min(chars.len() - i);
            for len in (2..=longest).rev() {
                let candidate: String = chars[i..i + len].iter().collect();
                if self.dict.contains(&candidate) {
                    matched = len;
                    break;
                }
            }
            phrases.push(make_phrase(&chars, i, i + matched));
            i += matched;
        }
        Ok(phrases)
    }
}

fn make_phrase(chars: &[char], start: usize, end: usize) -> Phrase {
    Phrase::new(chars[start..end].iter().collect::<String>(), start, end)
}

/// Verifies the partition invariant: phrase spans cover `[0, char_len)` with
/// no gaps or overlaps and concatenate back to the source text.
pub fn verify_coverage(text: &str, phrases: &[Phrase]) -> anyhow::Result<()> {
    let total = text.chars().count();
    if phrases.is_empty() {
        if total == 0 {
            return Ok(());
        }
        return Err(anyhow!("segmenter returned no phrases for non-empty text"));
    }

    let mut expected_start = 0usize;
    for p in phrases {
        if p.start != expected_start {
            return Err(anyhow!(
                "phrase gap/overlap at {} (expected start {expected_start})",
                p.start
            ));
        }
        if p.end <= p.start {
            return Err(anyhow!("empty phrase span at {}", p.start));
        }
        if p.text.chars().count() != p.end - p.start {
            return Err(anyhow!("phrase text/span length mismatch at {}", p.start));
        }
        expected_start = p.end;
    }
    if expected_start != total {
        return Err(anyhow!(
            "phrases cover {expected_start} of {total} chars"
        ));
    }

    let joined: String = phrases.iter().map(|p| p.text.as_str()).collect();
    if joined != text {
        return Err(anyhow!("concatenated phrases do not reconstruct the text"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{verify_coverage, DictSegmenter, Segmenter};
    use crate::bundle::Phrase;
    use crate::dict::Dictionary;

    fn segmenter() -> DictSegmenter {
        let dict = Dictionary::parse(
            "我 我 [wo3] /I/me/\n\
             愛 爱 [ai4] /to love/\n\
             學習 学习 [xue2 xi2] /to study/\n\
             你 你 [ni3] /you/\n\
             呢 呢 [ne5] /(question particle)/\n",
        );
        DictSegmenter::new(Arc::new(dict))
    }

    #[test]
    fn concrete_example_covers_all_eight_chars() {
        let text = "我爱学习。你呢？";
        let phrases = segmenter().segment(text).expect("segment");
        verify_coverage(text, &phrases).expect("coverage");
        let texts: Vec<&str> = phrases.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["我", "爱", "学习", "。", "你", "呢", "？"]);
        assert_eq!(phrases[2], Phrase::new("学习", 2, 4));
        assert_eq!(phrases.last().expect("last").end, 8);
    }

    #[test]
    fn mixed_latin_and_newlines_stay_covered() {
        let text = "我用 rust 学习。\nhello";
        let phrases = segmenter().segment(text).expect("segment");
        verify_coverage(text, &phrases).expect("coverage");
        // The Latin run between CJK chars is one phrase.
        assert!(phrases.iter().any(|p| p.text == " rust "));
    }

    #[test]
    fn empty_text_yields_no_phrases() {
        let phrases = segmenter().segment("").expect("segment");
        assert!(phrases.is_empty());
        verify_coverage("", &phrases).expect("coverage");
    }

    #[test]
    fn unknown_cjk_falls_back_to_single_chars() {
        let text = "魑魅";
        let phrases = segmenter().segment(text).expect("segment");
        verify_coverage(text, &phrases).expect("coverage");
        assert_eq!(phrases.len(), 2);
    }

    #[test]
    fn verify_coverage_rejects_gaps_and_overlaps() {
        let text = "你呢";
        let gap = vec![Phrase::new("你", 0, 1)];
        assert!(verify_coverage(text, &gap).is_err());
        let overlap = vec![Phrase::new("你", 0, 1), Phrase::new("你呢", 0, 2)];
        assert!(verify_coverage(text, &overlap).is_err());
        let good = vec![Phrase::new("你", 0, 1), Phrase::new("呢", 1, 2)];
        assert!(verify_coverage(text, &good).is_ok());
    }
}
