//! Word-timing extraction backends.
//!
//! Transcription and forced alignment happen outside this crate; these
//! backends only fetch their output and clean it up before matching.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::ExtractorConfig;
use crate::error::SyncError;
use crate::pipeline::traits::WordTimingExtractor;
use crate::types::WordTiming;

pub mod command;
pub mod sidecar;

pub use command::CommandExtractor;
pub use sidecar::SidecarExtractor;

/// Extractor used when timing extraction is turned off.
pub struct DisabledExtractor;

impl WordTimingExtractor for DisabledExtractor {
    fn extract(
        &self,
        _audio_path: &std::path::Path,
        _transcript: &str,
    ) -> Result<Vec<WordTiming>, SyncError> {
        Ok(Vec::new())
    }
}

/// `timeout` bounds backends that run external work.
pub fn build_extractor(
    config: &ExtractorConfig,
    timeout: Duration,
) -> Arc<dyn WordTimingExtractor> {
    match config {
        ExtractorConfig::Sidecar => Arc::new(SidecarExtractor),
        ExtractorConfig::Command { program, args } => Arc::new(
            CommandExtractor::new(program.clone(), args.clone()).with_timeout(timeout),
        ),
        ExtractorConfig::Disabled => Arc::new(DisabledExtractor),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WordTimingPayload {
    Bare(Vec<WordTiming>),
    Wrapped { words: Vec<WordTiming> },
}

/// Parse aligner output: either a bare array of `{word, start, end}` or `{"words": [...]}`.
pub fn parse_word_timings(json: &str) -> Result<Vec<WordTiming>, SyncError> {
    let payload: WordTimingPayload =
        serde_json::from_str(json).map_err(|e| SyncError::json("parse word timings", e))?;
    let words = match payload {
        WordTimingPayload::Bare(words) | WordTimingPayload::Wrapped { words } => words,
    };
    Ok(sanitize_word_timings(words))
}

/// Enforce the extractor contract: finite times, `end >= start`, non-decreasing starts.
pub fn sanitize_word_timings(words: Vec<WordTiming>) -> Vec<WordTiming> {
    let total = words.len();
    let mut clean: Vec<WordTiming> = words
        .into_iter()
        .filter(|w| w.start.is_finite() && w.end.is_finite() && !w.word.trim().is_empty())
        .map(|mut w| {
            if w.start < 0.0 {
                w.start = 0.0;
            }
            if w.end < w.start {
                w.end = w.start;
            }
            w
        })
        .collect();
    clean.sort_by(|a, b| a.start.total_cmp(&b.start));

    if clean.len() != total {
        tracing::warn!(
            dropped = total - clean.len(),
            kept = clean.len(),
            "extract: dropped malformed word timings"
        );
    }
    clean
}
