use once_cell::sync::Lazy;
use regex::Regex;

static CJK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[一-鿿]").expect("cjk"));

/// Sentence terminators: CJK full stops plus ASCII equivalents and newlines.
const SENTENCE_TERMINATORS: [char; 7] = ['。', '！', '？', '.', '!', '?', '\n'];

#[inline]
pub fn is_cjk_char(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

pub fn contains_cjk(text: &str) -> bool {
    CJK_RE.is_match(text)
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[inline]
fn is_sentence_terminator(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}

/// Splits text into sentences, keeping each terminator with its preceding
/// clause. A trailing clause with no terminator is still emitted.
/// Whitespace-only sentences are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut cur = String::new();
    for c in text.chars() {
        cur.push(c);
        if is_sentence_terminator(c) {
            push_sentence(&mut out, &mut cur);
        }
    }
    push_sentence(&mut out, &mut cur);
    out
}

fn push_sentence(out: &mut Vec<String>, cur: &mut String) {
    let trimmed = cur.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    cur.clear();
}

#[cfg(test)]
mod tests {
    use super::{char_len, contains_cjk, split_sentences};

    #[test]
    fn cjk_detection() {
        assert!(contains_cjk("学习"));
        assert!(contains_cjk("abc学"));
        assert!(!contains_cjk("abc 123 ，。"));
    }

    #[test]
    fn splits_on_cjk_and_ascii_terminators() {
        assert_eq!(
            split_sentences("我爱学习。你呢？"),
            vec!["我爱学习。", "你呢？"]
        );
        assert_eq!(split_sentences("Hello. World!"), vec!["Hello.", "World!"]);
    }

    #[test]
    fn trailing_clause_without_terminator_is_emitted() {
        assert_eq!(
            split_sentences("第一句。第二句"),
            vec!["第一句。", "第二句"]
        );
    }

    #[test]
    fn newlines_split_and_blanks_are_dropped() {
        assert_eq!(
            split_sentences("第一行\n\n  \n第二行。"),
            vec!["第一行", "第二行。"]
        );
        assert!(split_sentences("  \n\n ").is_empty());
        assert!(split_sentences("").is_empty());
    }

    #[test]
    fn char_len_counts_scalars() {
        assert_eq!(char_len("我爱学习。你呢？"), 8);
    }
}
