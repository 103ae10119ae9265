use std::sync::OnceLock;

use regex::Regex;

use crate::types::{NormalizedWords, WordTiming};

const STRIPPED_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '(', ')', '[', ']', '{', '}',
];

const CONTRACTIONS: &[(&str, [&str; 2])] = &[
    ("it's", ["it", "is"]),
    ("that's", ["that", "is"]),
    ("what's", ["what", "is"]),
    ("there's", ["there", "is"]),
    ("he's", ["he", "is"]),
    ("she's", ["she", "is"]),
    ("let's", ["let", "us"]),
    ("don't", ["do", "not"]),
    ("doesn't", ["does", "not"]),
    ("didn't", ["did", "not"]),
    ("isn't", ["is", "not"]),
    ("aren't", ["are", "not"]),
    ("wasn't", ["was", "not"]),
    ("weren't", ["were", "not"]),
    ("can't", ["can", "not"]),
    ("won't", ["will", "not"]),
    ("couldn't", ["could", "not"]),
    ("wouldn't", ["would", "not"]),
    ("shouldn't", ["should", "not"]),
    ("haven't", ["have", "not"]),
    ("hasn't", ["has", "not"]),
    ("hadn't", ["had", "not"]),
    ("i'm", ["i", "am"]),
    ("you're", ["you", "are"]),
    ("we're", ["we", "are"]),
    ("they're", ["they", "are"]),
    ("i've", ["i", "have"]),
    ("you've", ["you", "have"]),
    ("we've", ["we", "have"]),
    ("they've", ["they", "have"]),
    ("i'll", ["i", "will"]),
    ("you'll", ["you", "will"]),
    ("we'll", ["we", "will"]),
    ("they'll", ["they", "will"]),
    ("i'd", ["i", "would"]),
    ("you'd", ["you", "would"]),
];

fn word_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\w+(?:['’‘]\w+)*").expect("word run pattern is a valid regex")
    })
}

fn expand_contraction(part: &str) -> Option<[&'static str; 2]> {
    CONTRACTIONS
        .iter()
        .find(|(contraction, _)| *contraction == part)
        .map(|(_, expansion)| *expansion)
}

/// Canonical tokens for one spoken or written word.
///
/// Lowercases, strips sentence punctuation (hyphens and apostrophes survive),
/// splits on hyphens and expands known contractions into two tokens.
/// `"State-of-the-art"` yields four tokens, `"Isn't"` yields `["is", "not"]`.
pub fn normalize_and_expand(word: &str) -> Vec<String> {
    let cleaned: String = word
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .map(|c| if c == '’' || c == '‘' { '\'' } else { c })
        .collect();

    let mut tokens = Vec::new();
    for part in cleaned.split('-') {
        let part = part.trim().trim_matches('\'');
        if part.is_empty() {
            continue;
        }
        match expand_contraction(part) {
            Some(expansion) => tokens.extend(expansion.iter().map(|t| t.to_string())),
            None => tokens.push(part.to_string()),
        }
    }
    tokens
}

/// Tokenize free text (a visual's reference text) into normalized tokens.
pub fn tokenize_text(text: &str) -> Vec<String> {
    word_run_pattern()
        .find_iter(text)
        .flat_map(|m| normalize_and_expand(m.as_str()))
        .collect()
}

/// Flatten a timing sequence into tokens, remembering which word each token came from.
pub fn normalize_word_timings(words: &[WordTiming]) -> NormalizedWords {
    normalize_word_timings_with(words, normalize_and_expand)
}

pub fn normalize_word_timings_with(
    words: &[WordTiming],
    normalize_word: impl Fn(&str) -> Vec<String>,
) -> NormalizedWords {
    let mut normalized = NormalizedWords::default();
    for (idx, timing) in words.iter().enumerate() {
        for token in normalize_word(&timing.word) {
            normalized.tokens.push(token);
            normalized.word_map.push(idx);
        }
    }

    debug_assert_eq!(
        normalized.tokens.len(),
        normalized.word_map.len(),
        "normalized token/word map length contract violated"
    );
    normalized
}
