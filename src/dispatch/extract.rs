//! Pulling task input out of free-form query text.

use lazy_static::lazy_static;
use regex::Regex;

/// Minimum characters left after stripping instruction words.
const MIN_SUMMARY_CHARS: usize = 50;

/// Minimum characters per half of a separator split.
const MIN_COMPARISON_CHARS: usize = 20;

/// Separators tried in order when no explicit markers are present.
const SEPARATORS: &[&str] = &["\n---\n", "\n\n---\n\n", "\nvs\n", "\nversus\n", "\n\n\n", "\n\n"];

/// Label prefixes stripped from each half, applied in order.
const LABEL_PREFIXES: &[&str] = &[
    "text 1:",
    "text1:",
    "first:",
    "document 1:",
    "compare",
    "text 2:",
    "text2:",
    "second:",
    "document 2:",
];

lazy_static! {
    static ref INSTRUCTION_WORDS: Regex = Regex::new(
        r"(?i)\b(?:summarize|summary|sum up|brief|overview|gist|please|this|the following)\b"
    )
    .unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref TEXT_MARKERS: Regex =
        Regex::new(r"(?is)text\s*1\s*:\s*(.*?)\s*text\s*2\s*:\s*(.*?)(?:\n|$)").unwrap();
    static ref QUOTED_PAIR: Regex =
        Regex::new(r#"(?i)"([^"]+)"\s*(?:vs|versus|and)\s*"([^"]+)""#).unwrap();
}

/// Text to summarize once instruction words are removed, if enough remains.
pub fn extract_text_for_summary(query: &str) -> Option<String> {
    let stripped = INSTRUCTION_WORDS.replace_all(query, "");
    let text = WHITESPACE.replace_all(stripped.trim(), " ").into_owned();
    (text.chars().count() > MIN_SUMMARY_CHARS).then_some(text)
}

/// Two texts to compare, found by markers, quotes or a separator.
pub fn extract_two_texts(query: &str) -> Option<(String, String)> {
    let pair = marked_pair(query)
        .or_else(|| quoted_pair(query))
        .or_else(|| separated_pair(query))?;
    if pair.0.is_empty() || pair.1.is_empty() {
        return None;
    }
    Some(pair)
}

fn marked_pair(query: &str) -> Option<(String, String)> {
    let caps = TEXT_MARKERS.captures(query)?;
    Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
}

fn quoted_pair(query: &str) -> Option<(String, String)> {
    let caps = QUOTED_PAIR.captures(query)?;
    Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
}

fn separated_pair(query: &str) -> Option<(String, String)> {
    SEPARATORS.iter().find_map(|sep| {
        let (first, second) = query.split_once(sep)?;
        let first = strip_labels(first.trim());
        let second = strip_labels(second.trim());
        (first.chars().count() > MIN_COMPARISON_CHARS
            && second.chars().count() > MIN_COMPARISON_CHARS)
            .then(|| (first.to_string(), second.to_string()))
    })
}

fn strip_labels(text: &str) -> &str {
    LABEL_PREFIXES.iter().fold(text, |acc, prefix| {
        match acc.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(prefix) => acc[prefix.len()..].trim(),
            _ => acc,
        }
    })
}
