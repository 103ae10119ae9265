use crate::alignment::matcher::locate_tokens;
use crate::alignment::normalize::{normalize_and_expand, normalize_word_timings_with, tokenize_text};
use crate::alignment::report::AlignmentIssue;
use crate::alignment::timeline::reconstruct_timeline;
use crate::config::MatchPolicy;
use crate::document::Visual;
use crate::pipeline::traits::{ReferenceMatcher, TextNormalizer, TimelineReconstructor};
use crate::types::{MatchResult, WordTiming};

pub struct ContractionNormalizer;

impl TextNormalizer for ContractionNormalizer {
    fn normalize_word(&self, word: &str) -> Vec<String> {
        normalize_and_expand(word)
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        tokenize_text(text)
    }
}

/// Exact window search with a bounded token edit-distance fallback.
pub struct FuzzyReferenceMatcher {
    policy: MatchPolicy,
    normalizer: Box<dyn TextNormalizer>,
}

impl FuzzyReferenceMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            normalizer: Box::new(ContractionNormalizer),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }
}

impl Default for FuzzyReferenceMatcher {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}

impl ReferenceMatcher for FuzzyReferenceMatcher {
    fn locate(&self, reference_text: &str, word_segments: &[WordTiming]) -> MatchResult {
        if word_segments.is_empty() {
            return MatchResult::not_found();
        }
        // Both sides go through the same normalizer; asymmetric rules break matching.
        let ref_tokens = self.normalizer.tokenize(reference_text);
        let normalized =
            normalize_word_timings_with(word_segments, |word| self.normalizer.normalize_word(word));
        locate_tokens(
            reference_text,
            &ref_tokens,
            &normalized,
            word_segments,
            &self.policy,
        )
    }
}

pub struct GapClosingReconstructor;

impl TimelineReconstructor for GapClosingReconstructor {
    fn reconstruct(&self, visuals: &mut [Visual], segment_duration: f64) -> Vec<AlignmentIssue> {
        reconstruct_timeline(visuals, segment_duration)
    }
}
