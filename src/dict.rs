use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use crate::bundle::Definition;

/// One pronunciation variant of a headword: pinyin plus its senses in file
/// order.
#[derive(Clone, Debug)]
pub struct DictVariant {
    pub pinyin: String,
    pub senses: Vec<String>,
}

/// All variants for one simplified headword, in file order. Lookup always
/// takes the first variant and its first sense, so iteration order is stable.
#[derive(Clone, Debug, Default)]
pub struct DictEntry {
    pub variants: Vec<DictVariant>,
}

/// Static CC-CEDICT dictionary, keyed by the simplified form.
///
/// CEDICT line shape: `傳統 传统 [chuan2 tong3] /tradition/traditional/`.
#[derive(Debug, Default)]
pub struct Dictionary {
    entries: HashMap<String, DictEntry>,
    max_key_chars: usize,
}

impl Dictionary {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read dictionary: {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    /// Parses CEDICT text, skipping comments and malformed lines.
    pub fn parse(text: &str) -> Self {
        let mut dict = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((simplified, variant)) = parse_cedict_line(line) {
                dict.insert(simplified, variant);
            }
        }
        dict
    }

    fn insert(&mut self, simplified: String, variant: DictVariant) {
        self.max_key_chars = self.max_key_chars.max(simplified.chars().count());
        self.entries.entry(simplified).or_default().variants.push(variant);
    }

    pub fn contains(&self, simplified: &str) -> bool {
        self.entries.contains_key(simplified)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest headword length in chars; bounds the segmenter's match window.
    pub fn max_key_chars(&self) -> usize {
        self.max_key_chars
    }

    /// Exact-match lookup: first pronunciation variant, first sense.
    pub fn lookup(&self, simplified: &str) -> Option<Definition> {
        let entry = self.entries.get(simplified)?;
        let variant = entry.variants.first()?;
        let sense = variant.senses.first()?;
        Some(Definition::new(variant.pinyin.clone(), sense.clone()))
    }
}

fn parse_cedict_line(line: &str) -> Option<(String, DictVariant)> {
    // traditional simplified [pinyin] /sense/sense/
    let mut words = line.splitn(3, ' ');
    let _traditional = words.next()?;
    let simplified = words.next()?;
    let rest = words.next()?;

    let bracket_start = rest.find('[')?;
    let bracket_end = rest[bracket_start..].find(']')? + bracket_start;
    let pinyin = rest[bracket_start + 1..bracket_end].trim().to_string();

    let senses: Vec<String> = rest[bracket_end + 1..]
        .trim()
        .trim_matches('/')
        .split('/')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if simplified.is_empty() || senses.is_empty() {
        return None;
    }
    Some((
        simplified.to_string(),
        DictVariant { pinyin, senses },
    ))
}

#[cfg(test)]
mod tests {
    use super::Dictionary;

    const SAMPLE: &str = "\
# CC-CEDICT sample
傳統 传统 [chuan2 tong3] /tradition/traditional/
學習 学习 [xue2 xi2] /to learn/to study/
好 好 [hao3] /good/well/
好 好 [hao4] /to be fond of/
malformed line without brackets
";

    #[test]
    fn parses_and_skips_comments_and_garbage() {
        let dict = Dictionary::parse(SAMPLE);
        assert_eq!(dict.len(), 3);
        assert!(dict.contains("学习"));
        assert!(!dict.contains("學習"));
        assert_eq!(dict.max_key_chars(), 2);
    }

    #[test]
    fn lookup_takes_first_variant_first_sense() {
        let dict = Dictionary::parse(SAMPLE);
        let def = dict.lookup("好").expect("好");
        assert_eq!(def.pinyin, "hao3");
        assert_eq!(def.gloss, "good");
        let def = dict.lookup("学习").expect("学习");
        assert_eq!(def.pinyin, "xue2 xi2");
        assert_eq!(def.gloss, "to learn");
    }

    #[test]
    fn miss_returns_none() {
        let dict = Dictionary::parse(SAMPLE);
        assert!(dict.lookup("电脑").is_none());
    }
}
