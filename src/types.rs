use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    /// Seconds from the start of the narration audio.
    pub start: f64,
    /// Seconds from the start of the narration audio; never before `start`.
    pub end: f64,
}

impl WordTiming {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }
}

/// Compact `{word, start}` cache attached to a segment for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStamp {
    pub word: String,
    pub start: f64,
}

impl From<&WordTiming> for TimingStamp {
    fn from(timing: &WordTiming) -> Self {
        Self {
            word: timing.word.clone(),
            start: timing.start,
        }
    }
}

/// Normalized tokens of a timing sequence plus, for each token, the index of
/// the `WordTiming` it came from. One spoken word may expand to several tokens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedWords {
    pub tokens: Vec<String>,
    pub word_map: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub found: bool,
    pub fuzzy_found: bool,
    /// Token edit distance of the accepted window; `Some(0)` for exact hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<usize>,
    pub matched_segments: Vec<WordTiming>,
}

impl MatchResult {
    pub fn not_found() -> Self {
        Self {
            start: None,
            end: None,
            found: false,
            fuzzy_found: false,
            distance: None,
            matched_segments: Vec::new(),
        }
    }

    pub fn duration(&self) -> Option<f64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Round to two decimal places, the precision timestamps are stored at.
pub fn round_secs(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_secs_keeps_two_decimals() {
        assert_eq!(round_secs(1.234), 1.23);
        assert_eq!(round_secs(1.235_1), 1.24);
        assert_eq!(round_secs(-0.004), -0.0);
        assert_eq!(round_secs(7.0), 7.0);
    }

    #[test]
    fn not_found_has_no_interval() {
        let result = MatchResult::not_found();
        assert!(!result.found);
        assert!(!result.fuzzy_found);
        assert_eq!(result.start, None);
        assert_eq!(result.end, None);
        assert_eq!(result.duration(), None);
        assert!(result.matched_segments.is_empty());
    }

    #[test]
    fn timing_stamp_drops_end() {
        let stamp = TimingStamp::from(&WordTiming::new("hello", 0.5, 0.9));
        assert_eq!(stamp.word, "hello");
        assert_eq!(stamp.start, 0.5);
        let json = serde_json::to_value(&stamp).unwrap();
        assert_eq!(json, serde_json::json!({"word": "hello", "start": 0.5}));
    }
}
