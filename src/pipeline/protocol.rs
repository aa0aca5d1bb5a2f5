use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading item number, tolerant of `1.`, `1)`, `1:`, `1、` and fullwidth
/// variants. Replies are correlated by this number, never by line position.
static NUMBERED_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,4})\s*[.)。）:：、]\s*(.*)$").expect("numbered line"));

/// Renders the request side of the batch protocol: items numbered 1..N,
/// one per line.
pub fn render_numbered_block(items: &[String]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, item));
    }
    out
}

/// Parses a freeform numbered reply into number -> payload. Tolerates
/// reordered, dropped, and duplicated numbers (first occurrence wins) and
/// appends unnumbered continuation lines to the current item. A numbered
/// line outside `1..=expected` is discarded and ends the current item.
pub fn parse_numbered_reply(text: &str, expected: usize) -> HashMap<usize, String> {
    let mut out: HashMap<usize, String> = HashMap::new();
    let mut current: Option<usize> = None;

    for line in text.lines() {
        if let Some(caps) = NUMBERED_LINE_RE.captures(line) {
            let n: usize = caps[1].parse().unwrap_or(0);
            if n >= 1 && n <= expected {
                let payload = caps[2].trim().to_string();
                if !out.contains_key(&n) {
                    out.insert(n, payload);
                    current = Some(n);
                } else {
                    current = None;
                }
            } else {
                // A numbered line outside the batch range is noise, not a
                // continuation of the current item.
                current = None;
            }
            continue;
        }
        if let Some(n) = current {
            let extra = line.trim();
            if !extra.is_empty() {
                let slot = out.entry(n).or_default();
                if !slot.is_empty() {
                    slot.push(' ');
                }
                slot.push_str(extra);
            }
        }
    }

    out.retain(|_, v| !v.trim().is_empty());
    out
}

/// Strips markdown code fences and stray wrapping quotes from model output.
pub fn cleanup_model_text(text: &str) -> String {
    let mut s = text.trim().to_string();
    if s.starts_with("```") {
        if let Some(i) = s.find('\n') {
            s = s[i + 1..].to_string();
        }
        if let Some(end) = s.rfind("```") {
            s = s[..end].to_string();
        }
    }
    s.trim().trim_matches('"').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::{cleanup_model_text, parse_numbered_reply, render_numbered_block};

    #[test]
    fn renders_one_indexed_lines() {
        let block = render_numbered_block(&["你".to_string(), "呢".to_string()]);
        assert_eq!(block, "1. 你\n2. 呢\n");
    }

    #[test]
    fn parses_in_order_reply() {
        let reply = "1. [nǐ] you\n2. [ne] question particle\n";
        let map = parse_numbered_reply(reply, 2);
        assert_eq!(map[&1], "[nǐ] you");
        assert_eq!(map[&2], "[ne] question particle");
    }

    #[test]
    fn tolerates_reordering_and_dropped_lines() {
        let reply = "Here you go:\n3) third\n1: first\n";
        let map = parse_numbered_reply(reply, 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1], "first");
        assert_eq!(map[&3], "third");
        assert!(!map.contains_key(&2));
    }

    #[test]
    fn out_of_range_numbers_end_the_current_item() {
        let reply = "1. one\n99. not an item\nstray prose\n";
        let map = parse_numbered_reply(reply, 2);
        assert_eq!(map.len(), 1);
        // Neither the bogus numbered line nor the prose after it leaks
        // into item 1.
        assert_eq!(map[&1], "one");
    }

    #[test]
    fn first_duplicate_wins() {
        let reply = "1. keep\n1. discard\n";
        let map = parse_numbered_reply(reply, 1);
        assert_eq!(map[&1], "keep");
    }

    #[test]
    fn continuation_lines_join_the_current_item() {
        let reply = "1. to study;\nto learn\n2. you";
        let map = parse_numbered_reply(reply, 2);
        assert_eq!(map[&1], "to study; to learn");
        assert_eq!(map[&2], "you");
    }

    #[test]
    fn strips_code_fences() {
        let fenced = "```text\n1. one\n```";
        assert_eq!(cleanup_model_text(fenced), "1. one");
    }
}
