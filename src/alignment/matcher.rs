use crate::alignment::normalize::{normalize_word_timings, tokenize_text};
use crate::config::MatchPolicy;
use crate::types::{MatchResult, NormalizedWords, WordTiming};


/// Window of normalized tokens accepted as the location of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowHit {
    start_token: usize,
    distance: usize,
}

/// Locate `reference_text` in `word_segments` with the default match policy.
pub fn get_reference_text_timing(reference_text: &str, word_segments: &[WordTiming]) -> MatchResult {
    locate_reference(reference_text, word_segments, &MatchPolicy::default())
}

/// Exact sliding-window search first, token-level edit distance second.
///
/// Fuzzy acceptance is bounded by `policy.max_distance(ref_len)`. Ties go to the
/// leftmost window. Start and end resolve through the token-to-word map, so a
/// match that begins or ends inside an expanded contraction still spans the
/// whole spoken word.
pub fn locate_reference(
    reference_text: &str,
    word_segments: &[WordTiming],
    policy: &MatchPolicy,
) -> MatchResult {
    if word_segments.is_empty() {
        tracing::debug!(reference_text, "matcher: no word timings to search");
        return MatchResult::not_found();
    }
    let ref_tokens = tokenize_text(reference_text);
    let normalized = normalize_word_timings(word_segments);
    locate_tokens(reference_text, &ref_tokens, &normalized, word_segments, policy)
}

/// Matching over already-normalized tokens; `normalized.word_map` indexes `word_segments`.
pub fn locate_tokens(
    reference_text: &str,
    ref_tokens: &[String],
    normalized: &NormalizedWords,
    word_segments: &[WordTiming],
    policy: &MatchPolicy,
) -> MatchResult {
    if word_segments.is_empty() {
        return MatchResult::not_found();
    }
    if ref_tokens.is_empty() {
        tracing::debug!(reference_text, "matcher: reference has no tokens");
        return MatchResult::not_found();
    }
    if normalized.tokens.len() < ref_tokens.len() {
        tracing::debug!(
            reference_text,
            ref_tokens = ref_tokens.len(),
            available_tokens = normalized.tokens.len(),
            "matcher: reference longer than narration"
        );
        return MatchResult::not_found();
    }

    if let Some(hit) = find_exact_window(&normalized.tokens, ref_tokens) {
        return resolve_hit(hit, ref_tokens.len(), normalized, word_segments, false);
    }

    let max_distance = policy.max_distance(ref_tokens.len());
    match find_closest_window(&normalized.tokens, ref_tokens) {
        Some(hit) if hit.distance <= max_distance => {
            tracing::debug!(
                reference_text,
                distance = hit.distance,
                max_distance,
                "matcher: accepted fuzzy window"
            );
            resolve_hit(hit, ref_tokens.len(), normalized, word_segments, true)
        }
        best => {
            tracing::debug!(
                reference_text,
                best_distance = best.map(|hit| hit.distance),
                max_distance,
                "matcher: no acceptable window"
            );
            MatchResult::not_found()
        }
    }
}

fn find_exact_window(tokens: &[String], ref_tokens: &[String]) -> Option<WindowHit> {
    tokens
        .windows(ref_tokens.len())
        .position(|window| window == ref_tokens)
        .map(|start_token| WindowHit {
            start_token,
            distance: 0,
        })
}

fn find_closest_window(tokens: &[String], ref_tokens: &[String]) -> Option<WindowHit> {
    let mut best: Option<WindowHit> = None;
    for (start_token, window) in tokens.windows(ref_tokens.len()).enumerate() {
        let distance = token_edit_distance(window, ref_tokens);
        // Strict comparison keeps the leftmost window on ties.
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(WindowHit {
                start_token,
                distance,
            });
            if distance == 0 {
                break;
            }
        }
    }
    best
}

/// Levenshtein distance where whole tokens are the edit unit.
pub fn token_edit_distance(a: &[String], b: &[String]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, a_token) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_token) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(a_token != b_token);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            curr[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn resolve_hit(
    hit: WindowHit,
    window_len: usize,
    normalized: &NormalizedWords,
    word_segments: &[WordTiming],
    fuzzy: bool,
) -> MatchResult {
    let first_word = normalized.word_map[hit.start_token];
    let last_word = normalized.word_map[hit.start_token + window_len - 1];
    let start = word_segments[first_word].start;
    let end = word_segments[last_word].end;

    MatchResult {
        start: Some(start),
        end: Some(end),
        found: true,
        fuzzy_found: fuzzy,
        distance: Some(hit.distance),
        matched_segments: word_segments[first_word..=last_word].to_vec(),
    }
}
