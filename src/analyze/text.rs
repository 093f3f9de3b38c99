//! Script-ratio language heuristic and simple keyword extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Below this share of CJK characters a text counts as non-Chinese.
pub const CJK_RATIO_THRESHOLD: f64 = 0.1;

pub const MAX_KEYWORDS: usize = 10;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
        "did", "will", "would", "should", "could", "may", "might", "must", "can", "this", "that",
        "these", "those", "i", "you", "he", "she", "it", "we", "they",
    ]
    .into_iter()
    .collect()
});

static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Share of characters in the CJK Unified Ideographs block. Empty text is 0.
pub fn cjk_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut cjk = 0usize;
    for c in text.chars() {
        total += 1;
        if is_cjk(c) {
            cjk += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        cjk as f64 / total as f64
    }
}

/// True when `text` needs translation into Chinese. Empty text never does.
pub fn is_non_target(text: &str) -> bool {
    !text.is_empty() && cjk_ratio(text) < CJK_RATIO_THRESHOLD
}

/// "zh" or "en".
pub fn language_tag(text: &str) -> &'static str {
    if cjk_ratio(text) >= CJK_RATIO_THRESHOLD {
        "zh"
    } else {
        "en"
    }
}

/// Most frequent non-stop-words longer than three characters. Ties keep
/// first-occurrence order.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    if text.is_empty() || max == 0 {
        return Vec::new();
    }
    let lowered = text.to_lowercase();
    let cleaned = RE_PUNCT.replace_all(&lowered, " ");

    let mut order: Vec<&str> = Vec::new();
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for w in cleaned.split_whitespace() {
        if w.chars().count() <= 3 || STOP_WORDS.contains(w) {
            continue;
        }
        let n = freq.entry(w).or_insert(0);
        if *n == 0 {
            order.push(w);
        }
        *n += 1;
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| freq[b].cmp(&freq[a]));
    order.into_iter().take(max).map(str::to_string).collect()
}
